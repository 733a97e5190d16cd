//! Transaction orchestration around write use cases.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use domain::EventRecord;
use messaging::DomainEventMediator;
use persistence::UnitOfWork;

use crate::{ApplicationError, Result};

/// Default bound on mediator passes per `finish`.
pub const DEFAULT_MAX_DISPATCH_PASSES: usize = 10;

/// When integration events are handed to their handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntegrationDispatch {
    /// Publish inside the transaction. A broker failure rolls the write back.
    #[default]
    BeforeCommit,
    /// Publish once the commit succeeded. A broker failure is reported but the
    /// write stays committed.
    AfterCommit,
}

/// Settings for [`ApplicationService`].
#[derive(Debug, Clone)]
pub struct ApplicationServiceConfig {
    pub integration_dispatch: IntegrationDispatch,
    /// Mediator passes allowed before `finish` fails with
    /// [`ApplicationError::DispatchLimitExceeded`].
    pub max_dispatch_passes: usize,
}

impl Default for ApplicationServiceConfig {
    fn default() -> Self {
        Self {
            integration_dispatch: IntegrationDispatch::default(),
            max_dispatch_passes: DEFAULT_MAX_DISPATCH_PASSES,
        }
    }
}

/// Runs a use case body inside one transaction.
///
/// `run` starts the unit of work, runs the body, drains every aggregate the
/// body wrote through the mediator and commits. Any failure rolls back and
/// the first error is returned unchanged.
pub struct ApplicationService<U: UnitOfWork> {
    uow: U,
    mediator: Arc<DomainEventMediator<U::Event>>,
    config: ApplicationServiceConfig,
}

impl<U: UnitOfWork> ApplicationService<U> {
    pub fn new(uow: U, mediator: Arc<DomainEventMediator<U::Event>>) -> Self {
        Self::with_config(uow, mediator, ApplicationServiceConfig::default())
    }

    pub fn with_config(
        uow: U,
        mediator: Arc<DomainEventMediator<U::Event>>,
        config: ApplicationServiceConfig,
    ) -> Self {
        Self {
            uow,
            mediator,
            config,
        }
    }

    pub fn unit_of_work(&self) -> &U {
        &self.uow
    }

    pub fn config(&self) -> &ApplicationServiceConfig {
        &self.config
    }

    /// Begins the transaction.
    pub async fn start(&self) -> Result<()> {
        self.uow.start().await?;
        Ok(())
    }

    /// Dispatches pending domain events, publishes their integration events and
    /// commits.
    ///
    /// Handlers may write further aggregates through the same unit of work;
    /// dispatch repeats until a pass finds no new events, at most
    /// `max_dispatch_passes` times.
    #[tracing::instrument(skip(self))]
    pub async fn finish(&self) -> Result<()> {
        let dispatched = self.dispatch_domain_events().await?;

        match self.config.integration_dispatch {
            IntegrationDispatch::BeforeCommit => {
                self.mediator.publish_integration_events(&dispatched).await?;
                self.uow.commit().await?;
            }
            IntegrationDispatch::AfterCommit => {
                self.uow.commit().await?;
                self.mediator.publish_integration_events(&dispatched).await?;
            }
        }
        Ok(())
    }

    /// Rolls back the transaction if one is still open.
    ///
    /// A failed commit has already released the transaction, so there is
    /// nothing left to roll back in that case.
    #[tracing::instrument(skip(self))]
    pub async fn fail(&self) -> Result<()> {
        if self.uow.is_active().await {
            self.uow.rollback().await?;
        }
        Ok(())
    }

    /// Runs `body` as one atomic use case.
    ///
    /// The body receives a handle to this service's unit of work. On success
    /// its value is returned after commit; on failure the transaction is
    /// rolled back and the body's error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, body: F) -> Result<T>
    where
        F: FnOnce(U) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        self.start().await?;

        let outcome = match body(self.uow.clone()).await {
            Ok(value) => self.finish().await.map(|()| value),
            Err(error) => Err(error),
        };

        if let Err(error) = &outcome {
            tracing::debug!(%error, "use case failed, rolling back");
            if let Err(rollback_error) = self.fail().await {
                tracing::error!(%rollback_error, "rollback failed");
            }
        }

        metrics::histogram!("application_run_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn dispatch_domain_events(&self) -> Result<Vec<EventRecord<U::Event>>> {
        let passes = self.config.max_dispatch_passes;
        let mut dispatched = Vec::new();
        for _ in 0..passes {
            let mut progressed = false;
            for events in self.uow.aggregate_roots() {
                let records = self.mediator.publish(&events).await?;
                progressed |= !records.is_empty();
                dispatched.extend(records);
            }
            if !progressed {
                return Ok(dispatched);
            }
        }

        tracing::error!(passes, "domain events still pending, giving up");
        Err(ApplicationError::DispatchLimitExceeded { passes })
    }
}

/// Creates an [`ApplicationService`] with a fresh unit of work per request.
pub struct ApplicationServiceFactory<U: UnitOfWork> {
    new_unit_of_work: Arc<dyn Fn() -> U + Send + Sync>,
    mediator: Arc<DomainEventMediator<U::Event>>,
    config: ApplicationServiceConfig,
}

impl<U: UnitOfWork> Clone for ApplicationServiceFactory<U> {
    fn clone(&self) -> Self {
        Self {
            new_unit_of_work: Arc::clone(&self.new_unit_of_work),
            mediator: Arc::clone(&self.mediator),
            config: self.config.clone(),
        }
    }
}

impl<U: UnitOfWork> ApplicationServiceFactory<U> {
    pub fn new<F>(
        new_unit_of_work: F,
        mediator: Arc<DomainEventMediator<U::Event>>,
        config: ApplicationServiceConfig,
    ) -> Self
    where
        F: Fn() -> U + Send + Sync + 'static,
    {
        Self {
            new_unit_of_work: Arc::new(new_unit_of_work),
            mediator,
            config,
        }
    }

    pub fn create(&self) -> ApplicationService<U> {
        ApplicationService::with_config(
            (self.new_unit_of_work)(),
            Arc::clone(&self.mediator),
            self.config.clone(),
        )
    }
}

//! In-process dispatch of domain events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainEvent, EventLog, EventRecord, IntegrationEvent};

use crate::error::{HandlerError, MediatorError};

/// Handler invoked for a domain event before the transaction commits.
#[async_trait]
pub trait DomainEventHandler<E: DomainEvent>: Send + Sync {
    async fn handle(&self, record: &EventRecord<E>) -> Result<(), HandlerError>;
}

/// Handler invoked for an integration event.
#[async_trait]
pub trait IntegrationEventHandler: Send + Sync {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), HandlerError>;
}

/// Handlers keyed by event name.
///
/// Several handlers may be registered for one name; they run in registration
/// order.
pub struct HandlerRegistry<E> {
    domain: HashMap<&'static str, Vec<Arc<dyn DomainEventHandler<E>>>>,
    integration: HashMap<String, Vec<Arc<dyn IntegrationEventHandler>>>,
}

impl<E> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self {
            domain: HashMap::new(),
            integration: HashMap::new(),
        }
    }
}

impl<E: DomainEvent> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to a domain event name.
    pub fn register(&mut self, event_name: &'static str, handler: Arc<dyn DomainEventHandler<E>>) {
        self.domain.entry(event_name).or_default().push(handler);
    }

    /// Subscribes a handler to an integration event name.
    pub fn register_integration(
        &mut self,
        event_name: impl Into<String>,
        handler: Arc<dyn IntegrationEventHandler>,
    ) {
        self.integration
            .entry(event_name.into())
            .or_default()
            .push(handler);
    }

    pub fn handler_count(&self, event_name: &str) -> usize {
        self.domain.get(event_name).map_or(0, Vec::len)
    }

    pub fn integration_handler_count(&self, event_name: &str) -> usize {
        self.integration.get(event_name).map_or(0, Vec::len)
    }

    fn domain_handlers(&self, event_name: &str) -> &[Arc<dyn DomainEventHandler<E>>] {
        self.domain.get(event_name).map(Vec::as_slice).unwrap_or_default()
    }

    fn integration_handlers(&self, event_name: &str) -> &[Arc<dyn IntegrationEventHandler>] {
        self.integration.get(event_name).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Drains aggregate event logs into the registered handlers.
///
/// Each event is marked dispatched before its handlers run, so a second
/// `publish` never re-invokes a handler, even one that failed. Delivery
/// guarantees beyond the process come from the broker.
pub struct DomainEventMediator<E> {
    registry: HandlerRegistry<E>,
}

impl<E: DomainEvent> DomainEventMediator<E> {
    pub fn new(registry: HandlerRegistry<E>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry<E> {
        &self.registry
    }

    /// Dispatches the uncommitted events of one aggregate, in production order.
    ///
    /// Returns the records dispatched in this call.
    #[tracing::instrument(skip_all)]
    pub async fn publish(&self, events: &EventLog<E>) -> Result<Vec<EventRecord<E>>, MediatorError> {
        let mut dispatched = Vec::new();

        for record in events.uncommitted() {
            let event_name = record.event_name();
            events.mark_dispatched(record.event_id);
            metrics::counter!("mediator_events_dispatched_total").increment(1);

            for handler in self.registry.domain_handlers(event_name) {
                handler
                    .handle(&record)
                    .await
                    .map_err(|source| MediatorError::Handler {
                        event_name: event_name.to_string(),
                        source,
                    })?;
            }

            tracing::debug!(event_name, aggregate_id = %record.aggregate_id, "event dispatched");
            dispatched.push(record);
        }

        Ok(dispatched)
    }

    /// Converts dispatched records to integration events and runs their handlers.
    ///
    /// Records without an integration projection are skipped.
    #[tracing::instrument(skip_all, fields(count = records.len()))]
    pub async fn publish_integration_events(
        &self,
        records: &[EventRecord<E>],
    ) -> Result<(), MediatorError> {
        for event in records.iter().filter_map(EventRecord::integration_event) {
            for handler in self.registry.integration_handlers(&event.event_name) {
                handler
                    .handle(&event)
                    .await
                    .map_err(|source| MediatorError::Handler {
                        event_name: event.event_name.clone(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

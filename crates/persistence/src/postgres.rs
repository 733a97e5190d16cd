use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainEvent, EventLog};
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};

use crate::unit_of_work::{AggregateRegistry, UnitOfWork};
use crate::{PersistenceError, Result};

/// PostgreSQL-backed unit of work.
///
/// Holds at most one `sqlx` transaction. Dropping the last clone while a
/// transaction is still open rolls it back.
pub struct PostgresUnitOfWork<E> {
    pool: PgPool,
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
    aggregates: AggregateRegistry<E>,
    _event: PhantomData<fn() -> E>,
}

impl<E> Clone for PostgresUnitOfWork<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            tx: Arc::clone(&self.tx),
            aggregates: self.aggregates.clone(),
            _event: PhantomData,
        }
    }
}

impl<E: DomainEvent> PostgresUnitOfWork<E> {
    /// Creates an idle unit of work on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Arc::new(Mutex::new(None)),
            aggregates: AggregateRegistry::default(),
            _event: PhantomData,
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(pool: &PgPool) -> Result<()> {
        sqlx::migrate!("../../migrations").run(pool).await?;
        Ok(())
    }

    /// Returns the active transaction for repositories to bind their queries to.
    ///
    /// Fails with [`PersistenceError::NoActiveTransaction`] when idle.
    pub async fn transaction(
        &self,
    ) -> Result<
        OwnedMappedMutexGuard<Option<Transaction<'static, Postgres>>, Transaction<'static, Postgres>>,
    > {
        OwnedMutexGuard::try_map(Arc::clone(&self.tx).lock_owned().await, Option::as_mut)
            .map_err(|_| PersistenceError::NoActiveTransaction)
    }
}

#[async_trait]
impl<E: DomainEvent> UnitOfWork for PostgresUnitOfWork<E> {
    type Event = E;

    #[tracing::instrument(skip(self))]
    async fn start(&self) -> Result<()> {
        let mut slot = self.tx.lock().await;
        if slot.is_some() {
            return Err(PersistenceError::TransactionAlreadyActive);
        }
        *slot = Some(self.pool.begin().await?);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&self) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(PersistenceError::NoActiveTransaction)?;
        self.aggregates.clear();
        tx.commit().await?;
        metrics::counter!("uow_commits_total").increment(1);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn rollback(&self) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(PersistenceError::NoActiveTransaction)?;
        self.aggregates.clear();
        tx.rollback().await?;
        metrics::counter!("uow_rollbacks_total").increment(1);
        Ok(())
    }

    async fn is_active(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    fn add_aggregate_root(&self, events: &EventLog<E>) {
        self.aggregates.add(events);
    }

    fn aggregate_roots(&self) -> Vec<EventLog<E>> {
        self.aggregates.snapshot()
    }
}

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::{DomainEvent, EventLog};

use crate::{PersistenceError, Result};

/// Owner of one atomic transaction per request.
///
/// Implementations are cheap to clone; every clone refers to the same
/// transaction, so a use case body and the orchestrator around it share one
/// handle. States: idle -> active -> (committed | rolled back) -> idle.
/// Nested transactions are not supported.
#[async_trait]
pub trait UnitOfWork: Clone + Send + Sync + 'static {
    /// The domain event type carried by the aggregates this unit tracks.
    type Event: DomainEvent;

    /// Opens a transaction.
    ///
    /// Fails with [`PersistenceError::TransactionAlreadyActive`] when one is open.
    async fn start(&self) -> Result<()>;

    /// Commits and releases the transaction.
    ///
    /// Fails with [`PersistenceError::NoActiveTransaction`] when idle.
    async fn commit(&self) -> Result<()>;

    /// Rolls back and releases the transaction.
    ///
    /// Fails with [`PersistenceError::NoActiveTransaction`] when idle.
    async fn rollback(&self) -> Result<()>;

    /// Returns true while a transaction is open.
    async fn is_active(&self) -> bool;

    /// Registers the event log of an aggregate written in this transaction.
    fn add_aggregate_root(&self, events: &EventLog<Self::Event>);

    /// Event logs of every aggregate written in this transaction.
    fn aggregate_roots(&self) -> Vec<EventLog<Self::Event>>;
}

/// Extension trait providing convenience methods for units of work.
#[async_trait]
pub trait UnitOfWorkExt: UnitOfWork {
    /// Runs `work` inside the current transaction, starting one if idle.
    ///
    /// The transaction is left open; the caller decides whether to commit or
    /// roll back.
    async fn work<T, E, F, Fut>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Self) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
        T: Send,
        E: From<PersistenceError> + Send,
    {
        if !self.is_active().await {
            self.start().await?;
        }
        work(self.clone()).await
    }
}

// Blanket implementation for all UnitOfWork implementations
impl<U: UnitOfWork> UnitOfWorkExt for U {}

/// Set of aggregates written during the active transaction.
///
/// Deduplicated by event-log identity and kept in registration order.
pub struct AggregateRegistry<E>(Arc<Mutex<Vec<EventLog<E>>>>);

impl<E> Clone for AggregateRegistry<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> Default for AggregateRegistry<E> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }
}

impl<E: DomainEvent> AggregateRegistry<E> {
    fn lock(&self) -> MutexGuard<'_, Vec<EventLog<E>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, events: &EventLog<E>) {
        let mut logs = self.lock();
        if !logs.iter().any(|log| log.same_as(events)) {
            logs.push(events.clone());
        }
    }

    pub fn snapshot(&self) -> Vec<EventLog<E>> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use domain::{DomainEvent, EventLog};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard, RwLock};

use crate::unit_of_work::{AggregateRegistry, UnitOfWork};
use crate::{PersistenceError, Result};

/// Shared committed state for in-memory units of work.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Default)]
pub struct InMemoryDatabase<S> {
    state: Arc<RwLock<S>>,
}

impl<S> Clone for InMemoryDatabase<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: Clone + Default + Send + Sync + 'static> InMemoryDatabase<S> {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(S::default())),
        }
    }

    /// Returns a copy of the committed state.
    pub async fn snapshot(&self) -> S {
        self.state.read().await.clone()
    }
}

#[derive(Debug, Default)]
struct Counters {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    fail_on_commit: AtomicBool,
}

/// In-memory unit of work for testing.
///
/// `start` copies the committed state into a private working set that
/// repositories mutate; `commit` writes it back and `rollback` discards it.
/// Concurrent units on one database are last-writer-wins.
pub struct InMemoryUnitOfWork<S, E> {
    database: InMemoryDatabase<S>,
    working: Arc<Mutex<Option<S>>>,
    aggregates: AggregateRegistry<E>,
    counters: Arc<Counters>,
    _event: PhantomData<fn() -> E>,
}

impl<S, E> Clone for InMemoryUnitOfWork<S, E> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            working: Arc::clone(&self.working),
            aggregates: self.aggregates.clone(),
            counters: Arc::clone(&self.counters),
            _event: PhantomData,
        }
    }
}

impl<S, E> InMemoryUnitOfWork<S, E>
where
    S: Clone + Default + Send + Sync + 'static,
    E: DomainEvent,
{
    /// Creates an idle unit of work over the given database.
    pub fn new(database: InMemoryDatabase<S>) -> Self {
        Self {
            database,
            working: Arc::new(Mutex::new(None)),
            aggregates: AggregateRegistry::default(),
            counters: Arc::new(Counters::default()),
            _event: PhantomData,
        }
    }

    pub fn database(&self) -> &InMemoryDatabase<S> {
        &self.database
    }

    /// Returns the working set of the active transaction.
    ///
    /// Fails with [`PersistenceError::NoActiveTransaction`] when idle.
    pub async fn transaction(&self) -> Result<MappedMutexGuard<'_, S>> {
        MutexGuard::try_map(self.working.lock().await, Option::as_mut)
            .map_err(|_| PersistenceError::NoActiveTransaction)
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    /// Number of rollbacks.
    pub fn rollback_count(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    /// Configures the next commits to fail, discarding the working set.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.counters.fail_on_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S, E> UnitOfWork for InMemoryUnitOfWork<S, E>
where
    S: Clone + Default + Send + Sync + 'static,
    E: DomainEvent,
{
    type Event = E;

    async fn start(&self) -> Result<()> {
        let mut working = self.working.lock().await;
        if working.is_some() {
            return Err(PersistenceError::TransactionAlreadyActive);
        }
        *working = Some(self.database.state.read().await.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let state = self
            .working
            .lock()
            .await
            .take()
            .ok_or(PersistenceError::NoActiveTransaction)?;
        self.aggregates.clear();

        if self.counters.fail_on_commit.load(Ordering::SeqCst) {
            return Err(PersistenceError::CommitFailed(
                "simulated commit failure".to_string(),
            ));
        }

        *self.database.state.write().await = state;
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("uow_commits_total").increment(1);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.working
            .lock()
            .await
            .take()
            .ok_or(PersistenceError::NoActiveTransaction)?;
        self.aggregates.clear();
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("uow_rollbacks_total").increment(1);
        Ok(())
    }

    async fn is_active(&self) -> bool {
        self.working.lock().await.is_some()
    }

    fn add_aggregate_root(&self, events: &EventLog<E>) {
        self.aggregates.add(events);
    }

    fn aggregate_roots(&self) -> Vec<EventLog<E>> {
        self.aggregates.snapshot()
    }
}

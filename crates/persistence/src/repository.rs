//! Repository contracts for the catalog aggregates.
//!
//! Every method takes the unit of work whose transaction it binds to. Writes
//! register the aggregate's event log on the unit so its events are drained
//! before commit.

use async_trait::async_trait;
use common::AggregateId;
use domain::{CatalogEvent, Category, Genre};

use crate::Result;
use crate::unit_of_work::UnitOfWork;

/// Outcome of a bulk existence check, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistsResult {
    pub exists: Vec<AggregateId>,
    pub not_exists: Vec<AggregateId>,
}

impl ExistsResult {
    /// Splits `ids` by membership in `found`.
    pub fn partition(ids: &[AggregateId], found: &[AggregateId]) -> Self {
        let (exists, not_exists) = ids.iter().copied().partition(|id| found.contains(id));
        Self { exists, not_exists }
    }
}

#[async_trait]
pub trait CategoryRepository<U>: Send + Sync
where
    U: UnitOfWork<Event = CatalogEvent>,
{
    async fn insert(&self, uow: &U, category: &Category) -> Result<()>;

    /// Fails with a not-found error when the category does not exist.
    async fn update(&self, uow: &U, category: &Category) -> Result<()>;

    /// Fails with a not-found error when the category does not exist.
    async fn delete(&self, uow: &U, category: &Category) -> Result<()>;

    async fn find_by_id(&self, uow: &U, id: AggregateId) -> Result<Option<Category>>;

    async fn exists_by_ids(&self, uow: &U, ids: &[AggregateId]) -> Result<ExistsResult>;
}

#[async_trait]
pub trait GenreRepository<U>: Send + Sync
where
    U: UnitOfWork<Event = CatalogEvent>,
{
    /// Inserts the genre row and one join row per linked category.
    async fn insert(&self, uow: &U, genre: &Genre) -> Result<()>;

    /// Rewrites the genre row and its join rows.
    async fn update(&self, uow: &U, genre: &Genre) -> Result<()>;

    async fn delete(&self, uow: &U, genre: &Genre) -> Result<()>;

    async fn find_by_id(&self, uow: &U, id: AggregateId) -> Result<Option<Genre>>;

    /// Genres currently linked to a category.
    async fn find_by_category(&self, uow: &U, category_id: AggregateId) -> Result<Vec<Genre>>;
}

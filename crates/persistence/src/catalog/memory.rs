use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AggregateRoot, CatalogEvent, Category, DomainError, Genre};

use crate::memory::InMemoryUnitOfWork;
use crate::repository::{CategoryRepository, ExistsResult, GenreRepository};
use crate::unit_of_work::UnitOfWork;
use crate::{PersistenceError, Result};

/// Unit of work over the in-memory catalog tables.
pub type InMemoryCatalogUnitOfWork = InMemoryUnitOfWork<CatalogTables, CatalogEvent>;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreRow {
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Table layout mirroring the relational schema.
#[derive(Debug, Clone, Default)]
pub struct CatalogTables {
    pub categories: BTreeMap<AggregateId, CategoryRow>,
    pub genres: BTreeMap<AggregateId, GenreRow>,
    /// `(genre_id, category_id)` join rows.
    pub genre_categories: BTreeSet<(AggregateId, AggregateId)>,
}

impl CatalogTables {
    fn genre_categories_of(&self, genre_id: AggregateId) -> Vec<AggregateId> {
        self.genre_categories
            .iter()
            .filter(|(g, _)| *g == genre_id)
            .map(|(_, c)| *c)
            .collect()
    }

    fn load_genre(&self, id: AggregateId) -> Option<Genre> {
        self.genres.get(&id).map(|row| {
            Genre::restore(
                id,
                row.name.clone(),
                self.genre_categories_of(id),
                row.is_active,
                row.created_at,
            )
        })
    }

    fn write_genre_categories(&mut self, genre: &Genre) {
        let id = genre.id();
        self.genre_categories.retain(|(g, _)| *g != id);
        self.genre_categories
            .extend(genre.categories_id().map(|c| (id, c)));
    }
}

fn category_row(category: &Category) -> CategoryRow {
    CategoryRow {
        name: category.name().to_string(),
        description: category.description().map(str::to_string),
        is_active: category.is_active(),
        created_at: category.created_at(),
    }
}

/// In-memory category repository for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCategoryRepository;

impl InMemoryCategoryRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CategoryRepository<InMemoryCatalogUnitOfWork> for InMemoryCategoryRepository {
    async fn insert(&self, uow: &InMemoryCatalogUnitOfWork, category: &Category) -> Result<()> {
        let mut tables = uow.transaction().await?;
        if tables.categories.contains_key(&category.id()) {
            return Err(PersistenceError::DuplicateKey {
                aggregate_type: Category::aggregate_type(),
                id: category.id(),
            });
        }
        tables.categories.insert(category.id(), category_row(category));
        uow.add_aggregate_root(category.event_log());
        Ok(())
    }

    async fn update(&self, uow: &InMemoryCatalogUnitOfWork, category: &Category) -> Result<()> {
        let mut tables = uow.transaction().await?;
        let row = tables.categories.get_mut(&category.id()).ok_or_else(|| {
            DomainError::not_found(Category::aggregate_type(), vec![category.id()])
        })?;
        *row = category_row(category);
        uow.add_aggregate_root(category.event_log());
        Ok(())
    }

    async fn delete(&self, uow: &InMemoryCatalogUnitOfWork, category: &Category) -> Result<()> {
        let mut tables = uow.transaction().await?;
        if tables.categories.remove(&category.id()).is_none() {
            return Err(DomainError::not_found(Category::aggregate_type(), vec![category.id()]).into());
        }
        uow.add_aggregate_root(category.event_log());
        Ok(())
    }

    async fn find_by_id(
        &self,
        uow: &InMemoryCatalogUnitOfWork,
        id: AggregateId,
    ) -> Result<Option<Category>> {
        let tables = uow.transaction().await?;
        Ok(tables.categories.get(&id).map(|row| {
            Category::restore(
                id,
                row.name.clone(),
                row.description.clone(),
                row.is_active,
                row.created_at,
            )
        }))
    }

    async fn exists_by_ids(
        &self,
        uow: &InMemoryCatalogUnitOfWork,
        ids: &[AggregateId],
    ) -> Result<ExistsResult> {
        let tables = uow.transaction().await?;
        let found: Vec<_> = ids
            .iter()
            .copied()
            .filter(|id| tables.categories.contains_key(id))
            .collect();
        Ok(ExistsResult::partition(ids, &found))
    }
}

/// In-memory genre repository for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenreRepository;

impl InMemoryGenreRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenreRepository<InMemoryCatalogUnitOfWork> for InMemoryGenreRepository {
    async fn insert(&self, uow: &InMemoryCatalogUnitOfWork, genre: &Genre) -> Result<()> {
        let mut tables = uow.transaction().await?;
        if tables.genres.contains_key(&genre.id()) {
            return Err(PersistenceError::DuplicateKey {
                aggregate_type: Genre::aggregate_type(),
                id: genre.id(),
            });
        }
        tables.genres.insert(
            genre.id(),
            GenreRow {
                name: genre.name().to_string(),
                is_active: genre.is_active(),
                created_at: genre.created_at(),
            },
        );
        tables.write_genre_categories(genre);
        uow.add_aggregate_root(genre.event_log());
        Ok(())
    }

    async fn update(&self, uow: &InMemoryCatalogUnitOfWork, genre: &Genre) -> Result<()> {
        let mut tables = uow.transaction().await?;
        let row = tables
            .genres
            .get_mut(&genre.id())
            .ok_or_else(|| DomainError::not_found(Genre::aggregate_type(), vec![genre.id()]))?;
        row.name = genre.name().to_string();
        row.is_active = genre.is_active();
        tables.write_genre_categories(genre);
        uow.add_aggregate_root(genre.event_log());
        Ok(())
    }

    async fn delete(&self, uow: &InMemoryCatalogUnitOfWork, genre: &Genre) -> Result<()> {
        let mut tables = uow.transaction().await?;
        if tables.genres.remove(&genre.id()).is_none() {
            return Err(DomainError::not_found(Genre::aggregate_type(), vec![genre.id()]).into());
        }
        let id = genre.id();
        tables.genre_categories.retain(|(g, _)| *g != id);
        uow.add_aggregate_root(genre.event_log());
        Ok(())
    }

    async fn find_by_id(
        &self,
        uow: &InMemoryCatalogUnitOfWork,
        id: AggregateId,
    ) -> Result<Option<Genre>> {
        let tables = uow.transaction().await?;
        Ok(tables.load_genre(id))
    }

    async fn find_by_category(
        &self,
        uow: &InMemoryCatalogUnitOfWork,
        category_id: AggregateId,
    ) -> Result<Vec<Genre>> {
        let tables = uow.transaction().await?;
        let genre_ids: BTreeSet<_> = tables
            .genre_categories
            .iter()
            .filter(|(_, c)| *c == category_id)
            .map(|(g, _)| *g)
            .collect();
        Ok(genre_ids
            .into_iter()
            .filter_map(|id| tables.load_genre(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDatabase;
    use domain::{CreateCategory, CreateGenre};

    fn uow() -> InMemoryCatalogUnitOfWork {
        InMemoryUnitOfWork::new(InMemoryDatabase::new())
    }

    #[tokio::test]
    async fn writes_require_a_transaction() {
        let uow = uow();
        let repo = InMemoryCategoryRepository::new();
        let category = Category::create(CreateCategory::new("Movie")).unwrap();

        let err = repo.insert(&uow, &category).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NoActiveTransaction));
    }

    #[tokio::test]
    async fn insert_registers_the_aggregate() {
        let uow = uow();
        let repo = InMemoryCategoryRepository::new();
        let category = Category::create(CreateCategory::new("Movie")).unwrap();

        uow.start().await.unwrap();
        repo.insert(&uow, &category).await.unwrap();

        let roots = uow.aggregate_roots();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].same_as(category.event_log()));

        let found = repo.find_by_id(&uow, category.id()).await.unwrap().unwrap();
        assert_eq!(found.name(), "Movie");
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let uow = uow();
        let repo = InMemoryCategoryRepository::new();
        let category = Category::create(CreateCategory::new("Movie")).unwrap();

        uow.start().await.unwrap();
        repo.insert(&uow, &category).await.unwrap();
        let err = repo.insert(&uow, &category).await.unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn update_missing_category_is_not_found() {
        let uow = uow();
        let repo = InMemoryCategoryRepository::new();
        let category = Category::create(CreateCategory::new("Movie")).unwrap();

        uow.start().await.unwrap();
        let err = repo.update(&uow, &category).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Domain(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn exists_by_ids_reports_missing_ids() {
        let uow = uow();
        let repo = InMemoryCategoryRepository::new();
        let category = Category::create(CreateCategory::new("Movie")).unwrap();
        let missing = AggregateId::new();

        uow.start().await.unwrap();
        repo.insert(&uow, &category).await.unwrap();
        let result = repo
            .exists_by_ids(&uow, &[category.id(), missing])
            .await
            .unwrap();

        assert_eq!(result.exists, vec![category.id()]);
        assert_eq!(result.not_exists, vec![missing]);
    }

    #[tokio::test]
    async fn genre_join_rows_follow_the_aggregate() {
        let uow = uow();
        let repo = InMemoryGenreRepository::new();
        let first = AggregateId::new();
        let second = AggregateId::new();
        let mut genre = Genre::create(CreateGenre {
            name: "Drama".into(),
            categories_id: vec![first, second],
            is_active: true,
        })
        .unwrap();

        uow.start().await.unwrap();
        repo.insert(&uow, &genre).await.unwrap();
        assert_eq!(repo.find_by_category(&uow, first).await.unwrap().len(), 1);

        genre.remove_category(first);
        repo.update(&uow, &genre).await.unwrap();
        uow.commit().await.unwrap();

        let tables = uow.database().snapshot().await;
        assert_eq!(tables.genre_categories.len(), 1);
        assert!(tables.genre_categories.contains(&(genre.id(), second)));
    }

    #[tokio::test]
    async fn rolled_back_writes_are_invisible() {
        let uow = uow();
        let repo = InMemoryCategoryRepository::new();
        let category = Category::create(CreateCategory::new("Movie")).unwrap();

        uow.start().await.unwrap();
        repo.insert(&uow, &category).await.unwrap();
        uow.rollback().await.unwrap();

        uow.start().await.unwrap();
        assert!(repo.find_by_id(&uow, category.id()).await.unwrap().is_none());
        assert!(uow.aggregate_roots().is_empty());
    }
}

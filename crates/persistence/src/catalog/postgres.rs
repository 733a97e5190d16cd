use async_trait::async_trait;
use common::AggregateId;
use domain::{AggregateRoot, CatalogEvent, Category, DomainError, Genre};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::postgres::PostgresUnitOfWork;
use crate::repository::{CategoryRepository, ExistsResult, GenreRepository};
use crate::unit_of_work::UnitOfWork;
use crate::{PersistenceError, Result};

/// Unit of work over the PostgreSQL catalog schema.
pub type PgCatalogUnitOfWork = PostgresUnitOfWork<CatalogEvent>;

fn duplicate_or_database(
    aggregate_type: &'static str,
    id: AggregateId,
) -> impl FnOnce(sqlx::Error) -> PersistenceError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return PersistenceError::DuplicateKey { aggregate_type, id };
        }
        PersistenceError::Database(e)
    }
}

fn row_to_category(row: PgRow) -> Result<Category> {
    Ok(Category::restore(
        AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
        row.try_get("name")?,
        row.try_get("description")?,
        row.try_get("is_active")?,
        row.try_get("created_at")?,
    ))
}

fn row_to_genre(row: PgRow) -> Result<Genre> {
    let categories: Vec<Uuid> = row.try_get("categories_id")?;
    Ok(Genre::restore(
        AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
        row.try_get("name")?,
        categories.into_iter().map(AggregateId::from_uuid),
        row.try_get("is_active")?,
        row.try_get("created_at")?,
    ))
}

const SELECT_GENRE: &str = r#"
    SELECT g.id, g.name, g.is_active, g.created_at,
           ARRAY(SELECT gc.category_id FROM genre_categories gc
                 WHERE gc.genre_id = g.id ORDER BY gc.category_id) AS categories_id
    FROM genres g
"#;

/// PostgreSQL category repository.
#[derive(Debug, Clone, Default)]
pub struct PgCategoryRepository;

impl PgCategoryRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CategoryRepository<PgCatalogUnitOfWork> for PgCategoryRepository {
    #[tracing::instrument(skip(self, uow, category), fields(id = %category.id()))]
    async fn insert(&self, uow: &PgCatalogUnitOfWork, category: &Category) -> Result<()> {
        let mut tx = uow.transaction().await?;
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id().as_uuid())
        .bind(category.name())
        .bind(category.description())
        .bind(category.is_active())
        .bind(category.created_at())
        .execute(&mut **tx)
        .await
        .map_err(duplicate_or_database(Category::aggregate_type(), category.id()))?;

        uow.add_aggregate_root(category.event_log());
        Ok(())
    }

    #[tracing::instrument(skip(self, uow, category), fields(id = %category.id()))]
    async fn update(&self, uow: &PgCatalogUnitOfWork, category: &Category) -> Result<()> {
        let mut tx = uow.transaction().await?;
        let result = sqlx::query(
            "UPDATE categories SET name = $2, description = $3, is_active = $4 WHERE id = $1",
        )
        .bind(category.id().as_uuid())
        .bind(category.name())
        .bind(category.description())
        .bind(category.is_active())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(Category::aggregate_type(), vec![category.id()]).into());
        }
        uow.add_aggregate_root(category.event_log());
        Ok(())
    }

    #[tracing::instrument(skip(self, uow, category), fields(id = %category.id()))]
    async fn delete(&self, uow: &PgCatalogUnitOfWork, category: &Category) -> Result<()> {
        let mut tx = uow.transaction().await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category.id().as_uuid())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(Category::aggregate_type(), vec![category.id()]).into());
        }
        uow.add_aggregate_root(category.event_log());
        Ok(())
    }

    async fn find_by_id(
        &self,
        uow: &PgCatalogUnitOfWork,
        id: AggregateId,
    ) -> Result<Option<Category>> {
        let mut tx = uow.transaction().await?;
        let row = sqlx::query(
            "SELECT id, name, description, is_active, created_at FROM categories WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(row_to_category).transpose()
    }

    async fn exists_by_ids(
        &self,
        uow: &PgCatalogUnitOfWork,
        ids: &[AggregateId],
    ) -> Result<ExistsResult> {
        if ids.is_empty() {
            return Ok(ExistsResult::default());
        }
        let mut tx = uow.transaction().await?;
        let uuids: Vec<Uuid> = ids.iter().map(AggregateId::as_uuid).collect();
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&mut **tx)
            .await?;

        let found: Vec<AggregateId> = found.into_iter().map(AggregateId::from_uuid).collect();
        Ok(ExistsResult::partition(ids, &found))
    }
}

/// PostgreSQL genre repository. Category links live in `genre_categories`.
#[derive(Debug, Clone, Default)]
pub struct PgGenreRepository;

impl PgGenreRepository {
    pub fn new() -> Self {
        Self
    }

    async fn write_categories(
        tx: &mut sqlx::PgConnection,
        genre: &Genre,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM genre_categories WHERE genre_id = $1")
            .bind(genre.id().as_uuid())
            .execute(&mut *tx)
            .await?;

        let categories: Vec<Uuid> = genre.categories_id().map(|id| id.as_uuid()).collect();
        sqlx::query(
            r#"
            INSERT INTO genre_categories (genre_id, category_id)
            SELECT $1, category_id FROM UNNEST($2::uuid[]) AS t(category_id)
            "#,
        )
        .bind(genre.id().as_uuid())
        .bind(&categories)
        .execute(&mut *tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GenreRepository<PgCatalogUnitOfWork> for PgGenreRepository {
    #[tracing::instrument(skip(self, uow, genre), fields(id = %genre.id()))]
    async fn insert(&self, uow: &PgCatalogUnitOfWork, genre: &Genre) -> Result<()> {
        let mut tx = uow.transaction().await?;
        sqlx::query(
            "INSERT INTO genres (id, name, is_active, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(genre.id().as_uuid())
        .bind(genre.name())
        .bind(genre.is_active())
        .bind(genre.created_at())
        .execute(&mut **tx)
        .await
        .map_err(duplicate_or_database(Genre::aggregate_type(), genre.id()))?;

        Self::write_categories(&mut **tx, genre).await?;
        uow.add_aggregate_root(genre.event_log());
        Ok(())
    }

    #[tracing::instrument(skip(self, uow, genre), fields(id = %genre.id()))]
    async fn update(&self, uow: &PgCatalogUnitOfWork, genre: &Genre) -> Result<()> {
        let mut tx = uow.transaction().await?;
        let result = sqlx::query("UPDATE genres SET name = $2, is_active = $3 WHERE id = $1")
            .bind(genre.id().as_uuid())
            .bind(genre.name())
            .bind(genre.is_active())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(Genre::aggregate_type(), vec![genre.id()]).into());
        }
        Self::write_categories(&mut **tx, genre).await?;
        uow.add_aggregate_root(genre.event_log());
        Ok(())
    }

    #[tracing::instrument(skip(self, uow, genre), fields(id = %genre.id()))]
    async fn delete(&self, uow: &PgCatalogUnitOfWork, genre: &Genre) -> Result<()> {
        let mut tx = uow.transaction().await?;
        // join rows go with ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(genre.id().as_uuid())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(Genre::aggregate_type(), vec![genre.id()]).into());
        }
        uow.add_aggregate_root(genre.event_log());
        Ok(())
    }

    async fn find_by_id(&self, uow: &PgCatalogUnitOfWork, id: AggregateId) -> Result<Option<Genre>> {
        let mut tx = uow.transaction().await?;
        let row = sqlx::query(&format!("{SELECT_GENRE} WHERE g.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        row.map(row_to_genre).transpose()
    }

    async fn find_by_category(
        &self,
        uow: &PgCatalogUnitOfWork,
        category_id: AggregateId,
    ) -> Result<Vec<Genre>> {
        let mut tx = uow.transaction().await?;
        let rows = sqlx::query(&format!(
            "{SELECT_GENRE} WHERE g.id IN (SELECT genre_id FROM genre_categories WHERE category_id = $1) ORDER BY g.created_at"
        ))
        .bind(category_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(row_to_genre).collect()
    }
}

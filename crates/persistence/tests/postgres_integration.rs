//! PostgreSQL integration tests for the unit of work and catalog repositories.
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p persistence --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::AggregateId;
use domain::{AggregateRoot, Category, CreateCategory, CreateGenre, DomainError, Genre};
use persistence::{
    CategoryRepository, GenreRepository, PersistenceError, PgCatalogUnitOfWork,
    PgCategoryRepository, PgGenreRepository, UnitOfWork, UnitOfWorkExt,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_catalog_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE genre_categories, genres, categories")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn committed_writes_are_visible_to_other_connections() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool.clone());
    let repo = PgCategoryRepository::new();
    let category =
        Category::create(CreateCategory::new("Movie").with_description("Feature films")).unwrap();

    uow.start().await.unwrap();
    repo.insert(&uow, &category).await.unwrap();
    assert_eq!(count(&pool, "categories").await, 0);

    uow.commit().await.unwrap();
    assert_eq!(count(&pool, "categories").await, 1);
    assert!(!uow.is_active().await);
}

#[tokio::test]
#[serial]
async fn rollback_discards_writes() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool.clone());
    let repo = PgCategoryRepository::new();
    let category = Category::create(CreateCategory::new("Movie")).unwrap();

    uow.start().await.unwrap();
    repo.insert(&uow, &category).await.unwrap();
    assert_eq!(uow.aggregate_roots().len(), 1);
    uow.rollback().await.unwrap();

    assert_eq!(count(&pool, "categories").await, 0);
    assert!(uow.aggregate_roots().is_empty());
}

#[tokio::test]
#[serial]
async fn repositories_fail_without_a_transaction() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool);
    let repo = PgCategoryRepository::new();

    let err = repo.find_by_id(&uow, AggregateId::new()).await.unwrap_err();
    assert!(matches!(err, PersistenceError::NoActiveTransaction));
}

#[tokio::test]
#[serial]
async fn start_twice_is_rejected() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool);

    uow.start().await.unwrap();
    let err = uow.start().await.unwrap_err();
    assert!(matches!(err, PersistenceError::TransactionAlreadyActive));
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn category_round_trips_through_the_table() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool);
    let repo = PgCategoryRepository::new();
    let mut category =
        Category::create(CreateCategory::new("Movie").with_description("Feature films")).unwrap();

    uow.work(|uow| async move {
        repo.insert(&uow, &category).await?;
        category
            .update("Movies", None)
            .map_err(PersistenceError::from)?;
        repo.update(&uow, &category).await?;

        let found = repo.find_by_id(&uow, category.id()).await?.unwrap();
        assert_eq!(found.name(), "Movies");
        assert_eq!(found.description(), None);
        assert!(found.uncommitted_events().is_empty());
        Ok::<_, PersistenceError>(())
    })
    .await
    .unwrap();

    uow.commit().await.unwrap();
}

#[tokio::test]
#[serial]
async fn duplicate_insert_maps_to_duplicate_key() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool);
    let repo = PgCategoryRepository::new();
    let category = Category::create(CreateCategory::new("Movie")).unwrap();

    uow.start().await.unwrap();
    repo.insert(&uow, &category).await.unwrap();
    let err = repo.insert(&uow, &category).await.unwrap_err();
    assert!(matches!(err, PersistenceError::DuplicateKey { .. }));
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn deleting_a_missing_category_is_not_found() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool);
    let repo = PgCategoryRepository::new();
    let category = Category::create(CreateCategory::new("Ghost")).unwrap();

    uow.start().await.unwrap();
    let err = repo.delete(&uow, &category).await.unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Domain(DomainError::NotFound { .. })
    ));
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn exists_by_ids_partitions_input() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool);
    let repo = PgCategoryRepository::new();
    let first = Category::create(CreateCategory::new("Movie")).unwrap();
    let second = Category::create(CreateCategory::new("Series")).unwrap();
    let missing = AggregateId::new();

    uow.start().await.unwrap();
    repo.insert(&uow, &first).await.unwrap();
    repo.insert(&uow, &second).await.unwrap();

    let result = repo
        .exists_by_ids(&uow, &[missing, second.id(), first.id()])
        .await
        .unwrap();
    assert_eq!(result.exists, vec![second.id(), first.id()]);
    assert_eq!(result.not_exists, vec![missing]);
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn genre_links_are_rewritten_on_update() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool.clone());
    let categories = PgCategoryRepository::new();
    let genres = PgGenreRepository::new();
    let movie = Category::create(CreateCategory::new("Movie")).unwrap();
    let series = Category::create(CreateCategory::new("Series")).unwrap();

    uow.start().await.unwrap();
    categories.insert(&uow, &movie).await.unwrap();
    categories.insert(&uow, &series).await.unwrap();

    let mut genre = Genre::create(CreateGenre {
        name: "Drama".into(),
        categories_id: vec![movie.id(), series.id()],
        is_active: true,
    })
    .unwrap();
    genres.insert(&uow, &genre).await.unwrap();

    let linked = genres.find_by_category(&uow, movie.id()).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert!(linked[0].has_category(series.id()));

    assert!(genre.remove_category(movie.id()));
    genres.update(&uow, &genre).await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(count(&pool, "genre_categories").await, 1);

    uow.start().await.unwrap();
    assert!(genres.find_by_category(&uow, movie.id()).await.unwrap().is_empty());
    let found = genres.find_by_id(&uow, genre.id()).await.unwrap().unwrap();
    assert_eq!(found.categories_id().collect::<Vec<_>>(), vec![series.id()]);
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn deleting_a_category_leaves_genre_links_in_place() {
    let pool = get_test_pool().await;
    let uow = PgCatalogUnitOfWork::new(pool.clone());
    let categories = PgCategoryRepository::new();
    let genres = PgGenreRepository::new();
    let movie = Category::create(CreateCategory::new("Movie")).unwrap();

    uow.start().await.unwrap();
    categories.insert(&uow, &movie).await.unwrap();
    let genre = Genre::create(CreateGenre {
        name: "Drama".into(),
        categories_id: vec![movie.id()],
        is_active: true,
    })
    .unwrap();
    genres.insert(&uow, &genre).await.unwrap();
    movie.mark_deleted();
    categories.delete(&uow, &movie).await.unwrap();
    uow.commit().await.unwrap();

    // cleanup is driven asynchronously by the CategoryDeleted integration event
    assert_eq!(count(&pool, "categories").await, 0);
    assert_eq!(count(&pool, "genre_categories").await, 1);
}

//! Wiring of the catalog use cases, mediator and consumer for one backend.

use std::sync::Arc;

use application::catalog::CATEGORY_DELETED_QUEUE;
use application::{
    ApplicationServiceConfig, ApplicationServiceFactory, CategoryDeletedHandler,
    CreateCategoryUseCase, CreateGenreUseCase, DeleteCategoryUseCase,
    RemoveCategoryFromGenresUseCase, UpdateCategoryUseCase, catalog_destinations,
    catalog_handlers,
};
use domain::CatalogEvent;
use messaging::{BrokerTransport, DomainEventMediator, IntegrationEventConsumer, MessageBroker};
use persistence::{
    CatalogTables, CategoryRepository, GenreRepository, InMemoryCatalogUnitOfWork,
    InMemoryCategoryRepository, InMemoryDatabase, InMemoryGenreRepository, PgCatalogUnitOfWork,
    PgCategoryRepository, PgGenreRepository, UnitOfWork,
};
use sqlx::PgPool;

use crate::config::Config;

/// Storage backend the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    InMemory,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::InMemory => "in-memory",
            Backend::Postgres => "postgres",
        }
    }
}

/// The catalog use cases and the category-deleted consumer, sharing one
/// mediator and broker.
pub struct CatalogRuntime<U: UnitOfWork, C, G> {
    pub create_category: CreateCategoryUseCase<U, C>,
    pub update_category: UpdateCategoryUseCase<U, C>,
    pub delete_category: DeleteCategoryUseCase<U, C>,
    pub create_genre: CreateGenreUseCase<U, G, C>,
    pub category_deleted_consumer: IntegrationEventConsumer,
}

pub type InMemoryCatalogRuntime =
    CatalogRuntime<InMemoryCatalogUnitOfWork, InMemoryCategoryRepository, InMemoryGenreRepository>;

pub type PgCatalogRuntime = CatalogRuntime<PgCatalogUnitOfWork, PgCategoryRepository, PgGenreRepository>;

impl<U, C, G> CatalogRuntime<U, C, G>
where
    U: UnitOfWork<Event = CatalogEvent>,
    C: CategoryRepository<U> + 'static,
    G: GenreRepository<U> + 'static,
{
    /// Builds the runtime. `new_unit_of_work` is called once per use case run.
    pub fn new<F>(
        new_unit_of_work: F,
        categories: C,
        genres: G,
        transport: Arc<dyn BrokerTransport>,
        config: &Config,
    ) -> Self
    where
        F: Fn() -> U + Send + Sync + 'static,
    {
        let broker = MessageBroker::new(Arc::clone(&transport), catalog_destinations());
        let mediator = Arc::new(DomainEventMediator::new(catalog_handlers(broker)));
        let services = ApplicationServiceFactory::new(
            new_unit_of_work,
            mediator,
            ApplicationServiceConfig::default(),
        );

        let categories = Arc::new(categories);
        let genres = Arc::new(genres);

        let handler = CategoryDeletedHandler::new(RemoveCategoryFromGenresUseCase::new(
            services.clone(),
            Arc::clone(&genres),
        ));
        let category_deleted_consumer = IntegrationEventConsumer::new(
            transport,
            CATEGORY_DELETED_QUEUE,
            Arc::new(handler),
            config.retry_policy(),
        );

        Self {
            create_category: CreateCategoryUseCase::new(services.clone(), Arc::clone(&categories)),
            update_category: UpdateCategoryUseCase::new(services.clone(), Arc::clone(&categories)),
            delete_category: DeleteCategoryUseCase::new(services.clone(), Arc::clone(&categories)),
            create_genre: CreateGenreUseCase::new(services, genres, categories),
            category_deleted_consumer,
        }
    }
}

impl InMemoryCatalogRuntime {
    pub fn in_memory(
        database: InMemoryDatabase<CatalogTables>,
        transport: Arc<dyn BrokerTransport>,
        config: &Config,
    ) -> Self {
        Self::new(
            move || InMemoryCatalogUnitOfWork::new(database.clone()),
            InMemoryCategoryRepository::new(),
            InMemoryGenreRepository::new(),
            transport,
            config,
        )
    }
}

impl PgCatalogRuntime {
    pub fn postgres(pool: PgPool, transport: Arc<dyn BrokerTransport>, config: &Config) -> Self {
        Self::new(
            move || PgCatalogUnitOfWork::new(pool.clone()),
            PgCategoryRepository::new(),
            PgGenreRepository::new(),
            transport,
            config,
        )
    }
}

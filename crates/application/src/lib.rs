//! Application layer: the transaction orchestrator and the catalog use cases.
//!
//! Use cases never commit or roll back themselves. They hand their body to
//! [`ApplicationService::run`], which owns the unit of work lifecycle and
//! drains domain events through the mediator before commit.

pub mod catalog;
pub mod error;
pub mod handlers;
pub mod service;
pub mod use_cases;

pub use catalog::{catalog_destinations, catalog_handlers, declare_catalog_topology};
pub use error::{ApplicationError, Result};
pub use handlers::{CategoryDeletedHandler, PublishIntegrationEventInBroker};
pub use service::{
    ApplicationService, ApplicationServiceConfig, ApplicationServiceFactory,
    DEFAULT_MAX_DISPATCH_PASSES, IntegrationDispatch,
};
pub use use_cases::{
    CategoryOutput, CreateCategoryInput, CreateCategoryUseCase, CreateGenreInput,
    CreateGenreUseCase, DeleteCategoryUseCase, GenreOutput, RemoveCategoryFromGenresUseCase,
    UpdateCategoryInput, UpdateCategoryUseCase,
};

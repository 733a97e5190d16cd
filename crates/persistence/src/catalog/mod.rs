//! Catalog repositories for both backends.

pub mod memory;
pub mod postgres;

pub use memory::{
    CatalogTables, InMemoryCatalogUnitOfWork, InMemoryCategoryRepository, InMemoryGenreRepository,
};
pub use postgres::{PgCatalogUnitOfWork, PgCategoryRepository, PgGenreRepository};

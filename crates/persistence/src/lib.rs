//! Transaction ownership and catalog persistence.
//!
//! A [`UnitOfWork`] owns one transaction per request and tracks the
//! aggregates written inside it. Repositories bind their queries to the
//! unit's transaction and register every aggregate they write.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod unit_of_work;

pub use catalog::{
    CatalogTables, InMemoryCatalogUnitOfWork, InMemoryCategoryRepository, InMemoryGenreRepository,
    PgCatalogUnitOfWork, PgCategoryRepository, PgGenreRepository,
};
pub use error::{PersistenceError, Result};
pub use memory::{InMemoryDatabase, InMemoryUnitOfWork};
pub use postgres::PostgresUnitOfWork;
pub use repository::{CategoryRepository, ExistsResult, GenreRepository};
pub use unit_of_work::{AggregateRegistry, UnitOfWork, UnitOfWorkExt};

//! Catalog aggregates: categories and genres.

pub mod category;
pub mod events;
pub mod genre;

pub use category::{Category, CreateCategory};
pub use events::{
    CatalogEvent, CategoryCreatedData, CategoryDeletedData, CategoryUpdatedData,
    GenreCategoryRemovedData, GenreCreatedData, integration,
};
pub use genre::{CreateGenre, Genre};

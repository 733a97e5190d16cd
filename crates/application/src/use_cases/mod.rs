//! Catalog write use cases. Each one runs inside [`ApplicationService::run`].
//!
//! [`ApplicationService::run`]: crate::ApplicationService::run

pub mod category;
pub mod genre;

pub use category::{
    CategoryOutput, CreateCategoryInput, CreateCategoryUseCase, DeleteCategoryUseCase,
    UpdateCategoryInput, UpdateCategoryUseCase,
};
pub use genre::{
    CreateGenreInput, CreateGenreUseCase, GenreOutput, RemoveCategoryFromGenresUseCase,
};

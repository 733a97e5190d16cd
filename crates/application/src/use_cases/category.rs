use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AggregateRoot, CatalogEvent, Category, CreateCategory, DomainError};
use persistence::{CategoryRepository, UnitOfWork};
use serde::Serialize;

use crate::Result;
use crate::service::ApplicationServiceFactory;

/// Category as returned by the category use cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOutput {
    pub id: AggregateId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Category> for CategoryOutput {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id(),
            name: category.name().to_string(),
            description: category.description().map(str::to_string),
            is_active: category.is_active(),
            created_at: category.created_at(),
        }
    }
}

async fn load<U, R>(categories: &R, uow: &U, raw_id: &str) -> Result<Category>
where
    U: UnitOfWork<Event = CatalogEvent>,
    R: CategoryRepository<U> + ?Sized,
{
    let id: AggregateId = raw_id.parse().map_err(DomainError::from)?;
    categories
        .find_by_id(uow, id)
        .await?
        .ok_or_else(|| DomainError::not_found(Category::aggregate_type(), vec![id]).into())
}

#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

pub struct CreateCategoryUseCase<U: UnitOfWork, R> {
    services: ApplicationServiceFactory<U>,
    categories: Arc<R>,
}

impl<U, R> CreateCategoryUseCase<U, R>
where
    U: UnitOfWork<Event = CatalogEvent>,
    R: CategoryRepository<U> + 'static,
{
    pub fn new(services: ApplicationServiceFactory<U>, categories: Arc<R>) -> Self {
        Self {
            services,
            categories,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, input: CreateCategoryInput) -> Result<CategoryOutput> {
        let categories = Arc::clone(&self.categories);
        self.services
            .create()
            .run(|uow| async move {
                let category = Category::create(CreateCategory {
                    name: input.name,
                    description: input.description,
                    is_active: input.is_active,
                })?;
                categories.insert(&uow, &category).await?;
                Ok(CategoryOutput::from(&category))
            })
            .await
    }
}

#[derive(Debug, Clone)]
pub struct UpdateCategoryInput {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

pub struct UpdateCategoryUseCase<U: UnitOfWork, R> {
    services: ApplicationServiceFactory<U>,
    categories: Arc<R>,
}

impl<U, R> UpdateCategoryUseCase<U, R>
where
    U: UnitOfWork<Event = CatalogEvent>,
    R: CategoryRepository<U> + 'static,
{
    pub fn new(services: ApplicationServiceFactory<U>, categories: Arc<R>) -> Self {
        Self {
            services,
            categories,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, input: UpdateCategoryInput) -> Result<CategoryOutput> {
        let categories = Arc::clone(&self.categories);
        self.services
            .create()
            .run(|uow| async move {
                let mut category = load(categories.as_ref(), &uow, &input.id).await?;
                category.update(input.name, input.description)?;
                categories.update(&uow, &category).await?;
                Ok(CategoryOutput::from(&category))
            })
            .await
    }
}

pub struct DeleteCategoryUseCase<U: UnitOfWork, R> {
    services: ApplicationServiceFactory<U>,
    categories: Arc<R>,
}

impl<U, R> DeleteCategoryUseCase<U, R>
where
    U: UnitOfWork<Event = CatalogEvent>,
    R: CategoryRepository<U> + 'static,
{
    pub fn new(services: ApplicationServiceFactory<U>, categories: Arc<R>) -> Self {
        Self {
            services,
            categories,
        }
    }

    /// Deletes the category. Genres referencing it are cleaned up
    /// asynchronously through the CategoryDeleted integration event.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, id: &str) -> Result<()> {
        let categories = Arc::clone(&self.categories);
        let id = id.to_string();
        self.services
            .create()
            .run(|uow| async move {
                let category = load(categories.as_ref(), &uow, &id).await?;
                category.mark_deleted();
                categories.delete(&uow, &category).await?;
                Ok(())
            })
            .await
    }
}

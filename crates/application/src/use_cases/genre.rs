use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, Either, InvalidIdError};
use domain::{AggregateRoot, CatalogEvent, Category, CreateGenre, DomainError, Genre};
use persistence::{CategoryRepository, GenreRepository, UnitOfWork};
use serde::Serialize;

use crate::Result;
use crate::service::ApplicationServiceFactory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreOutput {
    pub id: AggregateId,
    pub name: String,
    pub categories_id: Vec<AggregateId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Genre> for GenreOutput {
    fn from(genre: &Genre) -> Self {
        Self {
            id: genre.id(),
            name: genre.name().to_string(),
            categories_id: genre.categories_id().collect(),
            is_active: genre.is_active(),
            created_at: genre.created_at(),
        }
    }
}

/// Parses every raw id, reporting all invalid ones at once.
fn parse_ids(raw: Vec<String>) -> std::result::Result<Vec<AggregateId>, DomainError> {
    Either::<_, InvalidIdError>::ok(raw)
        .chain_each(|id: String| Either::from(id.parse::<AggregateId>()))
        .into_result()
        .map_err(DomainError::InvalidIds)
}

#[derive(Debug, Clone)]
pub struct CreateGenreInput {
    pub name: String,
    pub categories_id: Vec<String>,
    pub is_active: bool,
}

pub struct CreateGenreUseCase<U: UnitOfWork, G, C> {
    services: ApplicationServiceFactory<U>,
    genres: Arc<G>,
    categories: Arc<C>,
}

impl<U, G, C> CreateGenreUseCase<U, G, C>
where
    U: UnitOfWork<Event = CatalogEvent>,
    G: GenreRepository<U> + 'static,
    C: CategoryRepository<U> + 'static,
{
    pub fn new(services: ApplicationServiceFactory<U>, genres: Arc<G>, categories: Arc<C>) -> Self {
        Self {
            services,
            genres,
            categories,
        }
    }

    /// Creates a genre linked to existing categories.
    ///
    /// Fails with `InvalidIds` listing every malformed id, or `NotFound`
    /// listing every category id that does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, input: CreateGenreInput) -> Result<GenreOutput> {
        let genres = Arc::clone(&self.genres);
        let categories = Arc::clone(&self.categories);
        self.services
            .create()
            .run(|uow| async move {
                let ids = parse_ids(input.categories_id)?;

                let existence = categories.exists_by_ids(&uow, &ids).await?;
                if !existence.not_exists.is_empty() {
                    return Err(
                        DomainError::not_found(Category::aggregate_type(), existence.not_exists)
                            .into(),
                    );
                }

                let genre = Genre::create(CreateGenre {
                    name: input.name,
                    categories_id: ids,
                    is_active: input.is_active,
                })?;
                genres.insert(&uow, &genre).await?;
                Ok(GenreOutput::from(&genre))
            })
            .await
    }
}

/// Detaches a deleted category from every genre that references it.
///
/// Driven by the CategoryDeleted integration event; running it again for the
/// same category is a no-op.
pub struct RemoveCategoryFromGenresUseCase<U: UnitOfWork, G> {
    services: ApplicationServiceFactory<U>,
    genres: Arc<G>,
}

impl<U, G> RemoveCategoryFromGenresUseCase<U, G>
where
    U: UnitOfWork<Event = CatalogEvent>,
    G: GenreRepository<U> + 'static,
{
    pub fn new(services: ApplicationServiceFactory<U>, genres: Arc<G>) -> Self {
        Self { services, genres }
    }

    /// Returns the number of genres updated.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, category_id: AggregateId) -> Result<usize> {
        let genres = Arc::clone(&self.genres);
        self.services
            .create()
            .run(|uow| async move {
                let mut updated = 0;
                for mut genre in genres.find_by_category(&uow, category_id).await? {
                    if genre.remove_category(category_id) {
                        genres.update(&uow, &genre).await?;
                        updated += 1;
                    }
                }
                tracing::info!(%category_id, updated, "category removed from genres");
                Ok(updated)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ids_reports_every_invalid_id() {
        let valid = AggregateId::new();
        let err = parse_ids(vec![
            "first".to_string(),
            valid.to_string(),
            "second".to_string(),
        ])
        .unwrap_err();

        match err {
            DomainError::InvalidIds(errors) => {
                let values: Vec<_> = errors.into_iter().map(|e| e.value).collect();
                assert_eq!(values, vec!["first", "second"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_ids_keeps_input_order() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let ids = parse_ids(vec![b.to_string(), a.to_string()]).unwrap();
        assert_eq!(ids, vec![b, a]);
    }
}

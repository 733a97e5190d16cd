//! Integration event handlers.

use async_trait::async_trait;
use common::{AggregateId, ErrorKind};
use domain::{CatalogEvent, IntegrationEvent};
use messaging::{HandlerError, IntegrationEventHandler, MessageBroker};
use persistence::{GenreRepository, UnitOfWork};
use serde::Deserialize;

use crate::use_cases::RemoveCategoryFromGenresUseCase;

/// Forwards integration events to the message broker.
pub struct PublishIntegrationEventInBroker {
    broker: MessageBroker,
}

impl PublishIntegrationEventInBroker {
    pub fn new(broker: MessageBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl IntegrationEventHandler for PublishIntegrationEventInBroker {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), HandlerError> {
        self.broker.publish_event(event).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CategoryDeletedPayload {
    category_id: AggregateId,
}

/// Consumes CategoryDeleted integration events and detaches the category from
/// its genres.
pub struct CategoryDeletedHandler<U: UnitOfWork, G> {
    use_case: RemoveCategoryFromGenresUseCase<U, G>,
}

impl<U: UnitOfWork, G> CategoryDeletedHandler<U, G> {
    pub fn new(use_case: RemoveCategoryFromGenresUseCase<U, G>) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl<U, G> IntegrationEventHandler for CategoryDeletedHandler<U, G>
where
    U: UnitOfWork<Event = CatalogEvent>,
    G: GenreRepository<U> + 'static,
{
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), HandlerError> {
        let payload: CategoryDeletedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|e| {
                HandlerError::with_kind(
                    ErrorKind::MalformedRequest,
                    format!("invalid {} payload: {e}", event.event_name),
                )
            })?;

        self.use_case.execute(payload.category_id).await?;
        Ok(())
    }
}

//! Catalog domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::event::{DomainEvent, IntegrationPayload};

/// Events that can occur on catalog aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CatalogEvent {
    /// Category was created.
    CategoryCreated(CategoryCreatedData),

    /// Category name or description changed.
    CategoryUpdated(CategoryUpdatedData),

    /// Category was deleted.
    CategoryDeleted(CategoryDeletedData),

    /// Genre was created.
    GenreCreated(GenreCreatedData),

    /// A category was detached from a genre.
    GenreCategoryRemoved(GenreCategoryRemovedData),
}

impl CatalogEvent {
    pub const CATEGORY_CREATED: &'static str = "CategoryCreated";
    pub const CATEGORY_UPDATED: &'static str = "CategoryUpdated";
    pub const CATEGORY_DELETED: &'static str = "CategoryDeleted";
    pub const GENRE_CREATED: &'static str = "GenreCreated";
    pub const GENRE_CATEGORY_REMOVED: &'static str = "GenreCategoryRemoved";
}

/// Integration event names published to the broker.
pub mod integration {
    pub const CATEGORY_CREATED: &str = "CategoryCreatedIntegrationEvent";
    pub const CATEGORY_DELETED: &str = "CategoryDeletedIntegrationEvent";
    pub const GENRE_CREATED: &str = "GenreCreatedIntegrationEvent";
}

impl DomainEvent for CatalogEvent {
    fn event_name(&self) -> &'static str {
        match self {
            CatalogEvent::CategoryCreated(_) => Self::CATEGORY_CREATED,
            CatalogEvent::CategoryUpdated(_) => Self::CATEGORY_UPDATED,
            CatalogEvent::CategoryDeleted(_) => Self::CATEGORY_DELETED,
            CatalogEvent::GenreCreated(_) => Self::GENRE_CREATED,
            CatalogEvent::GenreCategoryRemoved(_) => Self::GENRE_CATEGORY_REMOVED,
        }
    }

    fn to_integration(&self) -> Option<IntegrationPayload> {
        match self {
            CatalogEvent::CategoryCreated(data) => Some(IntegrationPayload {
                event_name: integration::CATEGORY_CREATED,
                payload: serde_json::json!({
                    "category_id": data.category_id,
                    "name": data.name,
                    "description": data.description,
                    "is_active": data.is_active,
                    "created_at": data.created_at,
                }),
            }),
            CatalogEvent::CategoryDeleted(data) => Some(IntegrationPayload {
                event_name: integration::CATEGORY_DELETED,
                payload: serde_json::json!({ "category_id": data.category_id }),
            }),
            CatalogEvent::GenreCreated(data) => Some(IntegrationPayload {
                event_name: integration::GENRE_CREATED,
                payload: serde_json::json!({
                    "genre_id": data.genre_id,
                    "name": data.name,
                    "categories_id": data.categories_id,
                    "is_active": data.is_active,
                    "created_at": data.created_at,
                }),
            }),
            CatalogEvent::CategoryUpdated(_) | CatalogEvent::GenreCategoryRemoved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCreatedData {
    pub category_id: AggregateId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryUpdatedData {
    pub category_id: AggregateId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDeletedData {
    pub category_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreCreatedData {
    pub genre_id: AggregateId,
    pub name: String,
    pub categories_id: Vec<AggregateId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreCategoryRemovedData {
    pub genre_id: AggregateId,
    pub category_id: AggregateId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_only_events_have_no_integration_form() {
        let event = CatalogEvent::GenreCategoryRemoved(GenreCategoryRemovedData {
            genre_id: AggregateId::new(),
            category_id: AggregateId::new(),
        });
        assert!(event.to_integration().is_none());
        assert_eq!(event.event_name(), "GenreCategoryRemoved");
    }

    #[test]
    fn category_deleted_projects_id_only() {
        let category_id = AggregateId::new();
        let event = CatalogEvent::CategoryDeleted(CategoryDeletedData { category_id });
        let projection = event.to_integration().unwrap();
        assert_eq!(projection.event_name, integration::CATEGORY_DELETED);
        assert_eq!(
            projection.payload,
            serde_json::json!({ "category_id": category_id })
        );
    }
}

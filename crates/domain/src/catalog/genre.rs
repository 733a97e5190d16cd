//! Genre aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::aggregate::AggregateRoot;
use crate::error::{DomainError, Notification};
use crate::event::EventLog;

use super::events::{CatalogEvent, GenreCategoryRemovedData, GenreCreatedData};

const MAX_NAME_LENGTH: usize = 255;

/// Input for creating a genre.
#[derive(Debug, Clone)]
pub struct CreateGenre {
    pub name: String,
    pub categories_id: Vec<AggregateId>,
    pub is_active: bool,
}

/// A catalog genre, linked to one or more categories.
#[derive(Debug)]
pub struct Genre {
    id: AggregateId,
    name: String,
    categories_id: BTreeSet<AggregateId>,
    is_active: bool,
    created_at: DateTime<Utc>,
    events: EventLog<CatalogEvent>,
}

impl Genre {
    /// Creates a new genre and records `GenreCreated`.
    pub fn create(cmd: CreateGenre) -> Result<Self, DomainError> {
        let categories_id: BTreeSet<_> = cmd.categories_id.into_iter().collect();

        let mut notification = Notification::new();
        if cmd.name.trim().is_empty() {
            notification.add_error("name", "name should not be empty");
        }
        if cmd.name.chars().count() > MAX_NAME_LENGTH {
            notification.add_error(
                "name",
                format!("name must be shorter than or equal to {MAX_NAME_LENGTH} characters"),
            );
        }
        if categories_id.is_empty() {
            notification.add_error("categories_id", "at least one category is required");
        }
        notification.into_result()?;

        let genre = Self {
            id: AggregateId::new(),
            name: cmd.name,
            categories_id,
            is_active: cmd.is_active,
            created_at: Utc::now(),
            events: EventLog::new(),
        };

        genre.apply_event(CatalogEvent::GenreCreated(GenreCreatedData {
            genre_id: genre.id,
            name: genre.name.clone(),
            categories_id: genre.categories_id.iter().copied().collect(),
            is_active: genre.is_active,
            created_at: genre.created_at,
        }));

        Ok(genre)
    }

    /// Rebuilds a persisted genre. No events are recorded.
    pub fn restore(
        id: AggregateId,
        name: String,
        categories_id: impl IntoIterator<Item = AggregateId>,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            categories_id: categories_id.into_iter().collect(),
            is_active,
            created_at,
            events: EventLog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Linked category ids, in ascending order.
    pub fn categories_id(&self) -> impl Iterator<Item = AggregateId> + '_ {
        self.categories_id.iter().copied()
    }

    pub fn has_category(&self, category_id: AggregateId) -> bool {
        self.categories_id.contains(&category_id)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Detaches a category. Returns false when it was not linked.
    pub fn remove_category(&mut self, category_id: AggregateId) -> bool {
        if !self.categories_id.remove(&category_id) {
            return false;
        }
        self.apply_event(CatalogEvent::GenreCategoryRemoved(
            GenreCategoryRemovedData {
                genre_id: self.id,
                category_id,
            },
        ));
        true
    }
}

impl AggregateRoot for Genre {
    type Event = CatalogEvent;

    fn aggregate_type() -> &'static str {
        "Genre"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn event_log(&self) -> &EventLog<CatalogEvent> {
        &self.events
    }
}

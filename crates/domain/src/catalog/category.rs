//! Category aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::aggregate::AggregateRoot;
use crate::error::{DomainError, Notification};
use crate::event::EventLog;

use super::events::{CatalogEvent, CategoryCreatedData, CategoryDeletedData, CategoryUpdatedData};

const MAX_NAME_LENGTH: usize = 255;

/// Input for creating a category.
#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

impl CreateCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A catalog category.
#[derive(Debug)]
pub struct Category {
    id: AggregateId,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    events: EventLog<CatalogEvent>,
}

impl Category {
    /// Creates a new category and records `CategoryCreated`.
    pub fn create(cmd: CreateCategory) -> Result<Self, DomainError> {
        validate_name(&cmd.name)?;

        let category = Self {
            id: AggregateId::new(),
            name: cmd.name,
            description: cmd.description,
            is_active: cmd.is_active,
            created_at: Utc::now(),
            events: EventLog::new(),
        };

        category.apply_event(CatalogEvent::CategoryCreated(CategoryCreatedData {
            category_id: category.id,
            name: category.name.clone(),
            description: category.description.clone(),
            is_active: category.is_active,
            created_at: category.created_at,
        }));

        Ok(category)
    }

    /// Rebuilds a persisted category. No events are recorded.
    pub fn restore(
        id: AggregateId,
        name: String,
        description: Option<String>,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            is_active,
            created_at,
            events: EventLog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Renames the category and replaces its description.
    pub fn update(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<(), DomainError> {
        let name = name.into();
        validate_name(&name)?;

        self.name = name;
        self.description = description;
        self.apply_event(CatalogEvent::CategoryUpdated(CategoryUpdatedData {
            category_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
        }));
        Ok(())
    }

    /// Records the deletion of this category.
    pub fn mark_deleted(&self) {
        self.apply_event(CatalogEvent::CategoryDeleted(CategoryDeletedData {
            category_id: self.id,
        }));
    }
}

impl AggregateRoot for Category {
    type Event = CatalogEvent;

    fn aggregate_type() -> &'static str {
        "Category"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn event_log(&self) -> &EventLog<CatalogEvent> {
        &self.events
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    let mut notification = Notification::new();
    if name.trim().is_empty() {
        notification.add_error("name", "name should not be empty");
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        notification.add_error(
            "name",
            format!("name must be shorter than or equal to {MAX_NAME_LENGTH} characters"),
        );
    }
    notification.into_result()
}

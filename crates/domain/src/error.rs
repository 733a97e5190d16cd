//! Domain error types.

use std::collections::BTreeMap;

use common::{AggregateId, ErrorKind, HasErrorKind, InvalidIdError};
use thiserror::Error;

/// Field-keyed validation messages collected while checking an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    errors: BTreeMap<String, Vec<String>>,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message against a field. Duplicate messages are ignored.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let messages = self.errors.entry(field.into()).or_default();
        let message = message.into();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn messages_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Converts into an error when any message was recorded.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.has_errors() {
            Err(DomainError::Validation(self))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// One or more entity invariants were violated.
    #[error("Entity validation error: {0}")]
    Validation(Notification),

    /// Referenced aggregates do not exist.
    #[error("{aggregate_type} Not Found using ID {}", join_ids(.ids))]
    NotFound {
        aggregate_type: &'static str,
        ids: Vec<AggregateId>,
    },

    /// One or more identifiers could not be parsed.
    #[error("Invalid ID: {}", join_invalid(.0))]
    InvalidIds(Vec<InvalidIdError>),
}

impl DomainError {
    pub fn not_found(aggregate_type: &'static str, ids: Vec<AggregateId>) -> Self {
        DomainError::NotFound {
            aggregate_type,
            ids,
        }
    }
}

impl From<InvalidIdError> for DomainError {
    fn from(e: InvalidIdError) -> Self {
        DomainError::InvalidIds(vec![e])
    }
}

impl HasErrorKind for DomainError {
    fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::EntityValidation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::InvalidIds(_) => ErrorKind::MalformedRequest,
        }
    }
}

fn join_ids(ids: &[AggregateId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_invalid(errors: &[InvalidIdError]) -> String {
    errors
        .iter()
        .map(|e| e.value.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

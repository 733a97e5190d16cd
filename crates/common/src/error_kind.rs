//! Error classification shared by every crate in the pipeline.

use serde::{Deserialize, Serialize};

/// Coarse classification carried by every error in the pipeline.
///
/// The consumer retry filter decides between retrying and dead-lettering
/// purely from this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced entity does not exist.
    NotFound,
    /// A business rule or entity invariant was violated.
    EntityValidation,
    /// The request or message could not be decoded or is structurally invalid.
    MalformedRequest,
    /// The pipeline was driven incorrectly (e.g. commit with no transaction).
    Programming,
    /// Database failure: lock timeout, serialization failure, lost connection.
    Transaction,
    /// The message broker was unavailable or refused the message.
    Broker,
    /// Any other infrastructure failure.
    Infrastructure,
    /// Unclassified failure. Treated as transient.
    Unknown,
}

impl ErrorKind {
    /// Returns true when redelivering the same message may succeed.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            ErrorKind::NotFound
                | ErrorKind::EntityValidation
                | ErrorKind::MalformedRequest
                | ErrorKind::Programming
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::EntityValidation => "entity_validation",
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::Programming => "programming",
            ErrorKind::Transaction => "transaction",
            ErrorKind::Broker => "broker",
            ErrorKind::Infrastructure => "infrastructure",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Implemented by every error type that crosses a crate boundary.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_failures_are_not_retriable() {
        assert!(!ErrorKind::NotFound.is_retriable());
        assert!(!ErrorKind::EntityValidation.is_retriable());
        assert!(!ErrorKind::MalformedRequest.is_retriable());
        assert!(!ErrorKind::Programming.is_retriable());
    }

    #[test]
    fn transient_failures_are_retriable() {
        assert!(ErrorKind::Transaction.is_retriable());
        assert!(ErrorKind::Broker.is_retriable());
        assert!(ErrorKind::Infrastructure.is_retriable());
        assert!(ErrorKind::Unknown.is_retriable());
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(ErrorKind::EntityValidation.to_string(), "entity_validation");
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}

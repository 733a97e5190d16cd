//! Shared building blocks for the catalog write pipeline.
//!
//! - [`AggregateId`] and [`EventId`] identity types
//! - [`ErrorKind`] tags used to classify failures across crate boundaries
//! - [`Either`], a success/failure container for composing validations

pub mod either;
pub mod error_kind;
pub mod types;

pub use either::Either;
pub use error_kind::{ErrorKind, HasErrorKind};
pub use types::{AggregateId, EventId, InvalidIdError};

//! Domain layer for the catalog write pipeline.
//!
//! This crate provides:
//! - [`AggregateRoot`] with a per-aggregate [`EventLog`] of produced and
//!   dispatched events
//! - [`DomainEvent`] and its broker-facing [`IntegrationEvent`] projection
//! - The catalog aggregates ([`Category`], [`Genre`]) and their events

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod event;

pub use aggregate::AggregateRoot;
pub use catalog::{CatalogEvent, Category, CreateCategory, CreateGenre, Genre};
pub use error::{DomainError, Notification};
pub use event::{DomainEvent, EventLog, EventRecord, IntegrationEvent, IntegrationPayload};

//! Broker routes and handler wiring for the catalog.

use std::sync::Arc;

use domain::CatalogEvent;
use domain::catalog::integration;
use messaging::{
    DELAYED_EXCHANGE, DIRECT_EXCHANGE, DestinationTable, HandlerRegistry, InMemoryBroker,
    MessageBroker,
};

use crate::handlers::PublishIntegrationEventInBroker;

pub const CATEGORY_CREATED_ROUTING_KEY: &str = "categories.created";
pub const CATEGORY_DELETED_ROUTING_KEY: &str = "categories.deleted";
pub const GENRE_CREATED_ROUTING_KEY: &str = "genres.created";

/// Queue consumed by the genre side to drop deleted categories.
pub const CATEGORY_DELETED_QUEUE: &str = "admin-catalog.genres.category-deleted";
pub const CATEGORY_DELETED_DEAD_LETTER_QUEUE: &str = "admin-catalog.genres.category-deleted.dlq";

/// Destinations of every catalog integration event.
pub fn catalog_destinations() -> DestinationTable {
    DestinationTable::new()
        .route(
            integration::CATEGORY_CREATED,
            DIRECT_EXCHANGE,
            CATEGORY_CREATED_ROUTING_KEY,
        )
        .route(
            integration::CATEGORY_DELETED,
            DIRECT_EXCHANGE,
            CATEGORY_DELETED_ROUTING_KEY,
        )
        .route(
            integration::GENRE_CREATED,
            DIRECT_EXCHANGE,
            GENRE_CREATED_ROUTING_KEY,
        )
}

/// Registry that forwards every routed integration event to the broker.
pub fn catalog_handlers(broker: MessageBroker) -> HandlerRegistry<CatalogEvent> {
    let names: Vec<String> = broker
        .destinations()
        .event_names()
        .map(str::to_string)
        .collect();
    let publisher = Arc::new(PublishIntegrationEventInBroker::new(broker));

    let mut registry = HandlerRegistry::new();
    for name in names {
        registry.register_integration(name, publisher.clone());
    }
    registry
}

/// Declares the catalog queues and bindings on an in-memory broker.
///
/// The consumer queue is bound to the delayed exchange under its own name,
/// the key its retries are published with.
pub fn declare_catalog_topology(broker: &InMemoryBroker, delayed_exchange: &str) -> messaging::Result<()> {
    if delayed_exchange != DELAYED_EXCHANGE {
        broker.declare_exchange(delayed_exchange, messaging::ExchangeKind::Delayed);
    }
    broker.declare_queue_with_dead_letter(CATEGORY_DELETED_QUEUE, CATEGORY_DELETED_DEAD_LETTER_QUEUE);
    broker.bind(CATEGORY_DELETED_QUEUE, DIRECT_EXCHANGE, CATEGORY_DELETED_ROUTING_KEY)?;
    broker.bind(CATEGORY_DELETED_QUEUE, delayed_exchange, CATEGORY_DELETED_QUEUE)?;
    Ok(())
}

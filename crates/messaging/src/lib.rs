//! Domain event dispatch and broker messaging.
//!
//! - [`DomainEventMediator`] drains aggregate event logs into in-process handlers
//! - [`MessageBroker`] publishes integration events to their configured exchange
//! - [`IntegrationEventConsumer`] consumes a queue through the [`RetryFilter`]
//! - [`InMemoryBroker`] is a [`BrokerTransport`] for tests and local runs

pub mod broker;
pub mod consumer;
pub mod destination;
pub mod error;
pub mod mediator;
pub mod memory;
pub mod retry;
pub mod transport;

pub use broker::MessageBroker;
pub use consumer::IntegrationEventConsumer;
pub use destination::{Destination, DestinationTable};
pub use error::{BrokerError, HandlerError, MediatorError, Result};
pub use mediator::{
    DomainEventHandler, DomainEventMediator, HandlerRegistry, IntegrationEventHandler,
};
pub use memory::{DELAYED_EXCHANGE, DIRECT_EXCHANGE, ExchangeKind, InMemoryBroker, PublishedMessage};
pub use retry::{Disposition, RetryFilter, RetryPolicy};
pub use transport::{
    BrokerTransport, DELAY_HEADER, Delivery, DeliveryStream, Message, MessageHeaders,
    RETRY_COUNT_HEADER,
};

//! Core aggregate root trait.

use common::AggregateId;

use crate::event::{DomainEvent, EventLog, EventRecord};

/// Trait for aggregate roots.
///
/// An aggregate is a consistency boundary. Its business methods record
/// domain events in the aggregate's [`EventLog`]; nothing leaves the
/// aggregate until the mediator drains the log.
pub trait AggregateRoot: Send + Sync {
    /// The type of events this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str
    where
        Self: Sized;

    /// Returns the aggregate's identifier.
    fn id(&self) -> AggregateId;

    /// Returns the aggregate's event log.
    fn event_log(&self) -> &EventLog<Self::Event>;

    /// Records an event produced by this aggregate.
    fn apply_event(&self, event: Self::Event) -> EventRecord<Self::Event> {
        let record = EventRecord::new(self.id(), event);
        tracing::trace!(
            aggregate_id = %record.aggregate_id,
            event_name = record.event_name(),
            "event applied"
        );
        self.event_log().apply(record.clone());
        record
    }

    /// Events produced but not yet dispatched, in production order.
    fn uncommitted_events(&self) -> Vec<EventRecord<Self::Event>> {
        self.event_log().uncommitted()
    }

    fn mark_event_as_dispatched(&self, record: &EventRecord<Self::Event>) {
        self.event_log().mark_dispatched(record.event_id);
    }

    fn clear_events(&self) {
        self.event_log().clear();
    }

    /// Registers an aggregate-local synchronous listener.
    fn register_handler<F>(&self, event_name: &'static str, handler: F)
    where
        F: Fn(&EventRecord<Self::Event>) + Send + Sync + 'static,
        Self: Sized,
    {
        self.event_log().register_handler(event_name, handler);
    }
}

//! Domain events, integration events and the per-aggregate event buffer.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use common::{AggregateId, EventId};
use serde::{Deserialize, Serialize};

/// Trait for domain events.
///
/// Domain events are facts that happened to an aggregate. They are named in
/// past tense and are usually the variants of one sum type per bounded
/// context, so the optional integration projection is resolved by `match`.
pub trait DomainEvent: Debug + Clone + Send + Sync + 'static {
    /// Returns the event name used for handler routing.
    fn event_name(&self) -> &'static str;

    /// Schema version of the event payload.
    fn event_version(&self) -> u32 {
        1
    }

    /// Projects this event onto its broker-facing form.
    ///
    /// Returns `None` for events that only trigger local side effects.
    fn to_integration(&self) -> Option<IntegrationPayload>;
}

/// Name and body of an integration event, before the envelope fields are added.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationPayload {
    pub event_name: &'static str,
    pub payload: serde_json::Value,
}

/// Broker-transportable projection of a domain event.
///
/// Serializes to `{event_version, event_name, occurred_on, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub event_version: u32,
    pub event_name: String,
    pub occurred_on: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// A domain event together with its occurrence metadata.
#[derive(Debug, Clone)]
pub struct EventRecord<E> {
    /// Identity used to deduplicate the event inside a buffer.
    pub event_id: EventId,

    /// The aggregate that produced the event.
    pub aggregate_id: AggregateId,

    /// When the event occurred.
    pub occurred_on: DateTime<Utc>,

    /// The event itself.
    pub event: E,
}

impl<E: DomainEvent> EventRecord<E> {
    /// Records an event that occurred now.
    pub fn new(aggregate_id: AggregateId, event: E) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_id,
            occurred_on: Utc::now(),
            event,
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.event.event_name()
    }

    /// Builds the integration event for this record, if the event has one.
    pub fn integration_event(&self) -> Option<IntegrationEvent> {
        self.event
            .to_integration()
            .map(|projection| IntegrationEvent {
                event_version: self.event.event_version(),
                event_name: projection.event_name.to_string(),
                occurred_on: self.occurred_on,
                payload: projection.payload,
            })
    }
}

/// Synchronous listener notified when an aggregate applies an event.
pub type LocalHandler<E> = Arc<dyn Fn(&EventRecord<E>) + Send + Sync>;

/// Produced and dispatched events of one aggregate.
pub struct EventBuffer<E> {
    produced: Vec<EventRecord<E>>,
    dispatched: HashSet<EventId>,
    local_handlers: HashMap<&'static str, Vec<LocalHandler<E>>>,
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self {
            produced: Vec::new(),
            dispatched: HashSet::new(),
            local_handlers: HashMap::new(),
        }
    }
}

impl<E: DomainEvent> EventBuffer<E> {
    /// Stores the record and returns the listeners to notify, or `None` for a
    /// duplicate.
    fn apply(&mut self, record: &EventRecord<E>) -> Option<Vec<LocalHandler<E>>> {
        if self.produced.iter().any(|e| e.event_id == record.event_id) {
            return None;
        }
        self.produced.push(record.clone());
        Some(
            self.local_handlers
                .get(record.event_name())
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn uncommitted(&self) -> Vec<EventRecord<E>> {
        self.produced
            .iter()
            .filter(|e| !self.dispatched.contains(&e.event_id))
            .cloned()
            .collect()
    }

    fn mark_dispatched(&mut self, event_id: EventId) {
        // dispatched must stay a subset of produced
        if self.produced.iter().any(|e| e.event_id == event_id) {
            self.dispatched.insert(event_id);
        }
    }
}

/// Shared handle to an aggregate's event buffer.
///
/// The aggregate, the unit of work's dirty set and the mediator all hold
/// clones of the same log, so dispatch marks made by the mediator are visible
/// on the aggregate.
pub struct EventLog<E>(Arc<Mutex<EventBuffer<E>>>);

impl<E> Clone for EventLog<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(EventBuffer::default())))
    }
}

impl<E> Debug for EventLog<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}

impl<E: DomainEvent> EventLog<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EventBuffer<E>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event and notifies local listeners for its name.
    ///
    /// Listeners run after the buffer lock is released, so they may read this
    /// log.
    pub fn apply(&self, record: EventRecord<E>) {
        let listeners = self.lock().apply(&record);
        for listener in listeners.into_iter().flatten() {
            listener(&record);
        }
    }

    /// Events produced but not yet dispatched, in production order.
    pub fn uncommitted(&self) -> Vec<EventRecord<E>> {
        self.lock().uncommitted()
    }

    /// Every produced event, dispatched or not.
    pub fn produced(&self) -> Vec<EventRecord<E>> {
        self.lock().produced.clone()
    }

    pub fn is_dispatched(&self, event_id: EventId) -> bool {
        self.lock().dispatched.contains(&event_id)
    }

    pub fn mark_dispatched(&self, event_id: EventId) {
        self.lock().mark_dispatched(event_id);
    }

    /// Empties both the produced and dispatched sets.
    pub fn clear(&self) {
        let mut buffer = self.lock();
        buffer.produced.clear();
        buffer.dispatched.clear();
    }

    /// Registers a synchronous listener for an event name.
    pub fn register_handler<F>(&self, event_name: &'static str, handler: F)
    where
        F: Fn(&EventRecord<E>) + Send + Sync + 'static,
    {
        self.lock()
            .local_handlers
            .entry(event_name)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Returns true when both handles point at the same buffer.
    pub fn same_as(&self, other: &EventLog<E>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Created { name: String },
        Touched,
    }

    impl DomainEvent for TestEvent {
        fn event_name(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Touched => "TestTouched",
            }
        }

        fn event_version(&self) -> u32 {
            2
        }

        fn to_integration(&self) -> Option<IntegrationPayload> {
            match self {
                TestEvent::Created { name } => Some(IntegrationPayload {
                    event_name: "TestCreatedIntegrationEvent",
                    payload: serde_json::json!({ "name": name }),
                }),
                TestEvent::Touched => None,
            }
        }
    }

    fn record(event: TestEvent) -> EventRecord<TestEvent> {
        EventRecord::new(AggregateId::new(), event)
    }

    #[test]
    fn uncommitted_preserves_production_order() {
        let log = EventLog::new();
        let first = record(TestEvent::Created { name: "a".into() });
        let second = record(TestEvent::Touched);
        log.apply(first.clone());
        log.apply(second.clone());

        let ids: Vec<_> = log.uncommitted().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![first.event_id, second.event_id]);
    }

    #[test]
    fn apply_deduplicates_by_identity() {
        let log = EventLog::new();
        let event = record(TestEvent::Touched);
        log.apply(event.clone());
        log.apply(event);
        assert_eq!(log.produced().len(), 1);
    }

    #[test]
    fn dispatched_events_leave_the_uncommitted_view() {
        let log = EventLog::new();
        let first = record(TestEvent::Touched);
        let second = record(TestEvent::Touched);
        log.apply(first.clone());
        log.apply(second.clone());

        log.mark_dispatched(first.event_id);

        let uncommitted = log.uncommitted();
        assert_eq!(uncommitted.len(), 1);
        assert_eq!(uncommitted[0].event_id, second.event_id);
        assert!(log.is_dispatched(first.event_id));
        assert_eq!(log.produced().len(), 2);
    }

    #[test]
    fn unknown_event_cannot_be_marked_dispatched() {
        let log: EventLog<TestEvent> = EventLog::new();
        let stray = EventId::new();
        log.mark_dispatched(stray);
        assert!(!log.is_dispatched(stray));
    }

    #[test]
    fn clear_empties_both_sets() {
        let log = EventLog::new();
        let event = record(TestEvent::Touched);
        log.apply(event.clone());
        log.mark_dispatched(event.event_id);

        log.clear();

        assert!(log.produced().is_empty());
        assert!(log.uncommitted().is_empty());
        assert!(!log.is_dispatched(event.event_id));
    }

    #[test]
    fn local_handlers_fire_only_for_their_event_name() {
        let log = EventLog::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        log.register_handler("TestTouched", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        log.apply(record(TestEvent::Created { name: "x".into() }));
        log.apply(record(TestEvent::Touched));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn local_handlers_can_read_their_own_log() {
        let log = EventLog::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (reader, sink) = (log.clone(), Arc::clone(&seen));
        log.register_handler("TestTouched", move |record| {
            let produced = reader.produced().len();
            let dispatched = reader.is_dispatched(record.event_id);
            sink.lock().unwrap().push((produced, dispatched));
        });

        log.apply(record(TestEvent::Touched));
        log.apply(record(TestEvent::Touched));

        assert_eq!(*seen.lock().unwrap(), vec![(1, false), (2, false)]);
    }

    #[test]
    fn duplicate_apply_does_not_notify_again() {
        let log = EventLog::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        log.register_handler("TestTouched", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let event = record(TestEvent::Touched);
        log.apply(event.clone());
        log.apply(event);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn integration_event_carries_envelope_fields() {
        let event = record(TestEvent::Created { name: "drama".into() });
        let integration = event.integration_event().unwrap();
        assert_eq!(integration.event_name, "TestCreatedIntegrationEvent");
        assert_eq!(integration.event_version, 2);
        assert_eq!(integration.occurred_on, event.occurred_on);
        assert_eq!(integration.payload["name"], "drama");

        assert!(record(TestEvent::Touched).integration_event().is_none());
    }

    #[test]
    fn integration_event_wire_shape() {
        let event = record(TestEvent::Created { name: "x".into() });
        let json = serde_json::to_value(event.integration_event().unwrap()).unwrap();
        let object = json.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["event_name", "event_version", "occurred_on", "payload"]
        );
        assert!(json["occurred_on"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn clones_share_one_buffer() {
        let log: EventLog<TestEvent> = EventLog::new();
        let other = log.clone();
        other.apply(record(TestEvent::Touched));
        assert_eq!(log.produced().len(), 1);
        assert!(log.same_as(&other));
        assert!(!log.same_as(&EventLog::new()));
    }
}

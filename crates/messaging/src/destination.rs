use std::collections::HashMap;

/// Where an integration event is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub exchange: String,
    pub routing_key: String,
}

/// Static mapping from integration event name to its destination.
#[derive(Debug, Clone, Default)]
pub struct DestinationTable {
    routes: HashMap<String, Destination>,
}

impl DestinationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route, replacing any previous one for the same event name.
    pub fn route(
        mut self,
        event_name: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        self.routes.insert(
            event_name.into(),
            Destination {
                exchange: exchange.into(),
                routing_key: routing_key.into(),
            },
        );
        self
    }

    pub fn get(&self, event_name: &str) -> Option<&Destination> {
        self.routes.get(event_name)
    }

    /// Event names with a configured destination.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

use std::sync::Arc;

use domain::IntegrationEvent;

use crate::destination::DestinationTable;
use crate::transport::{BrokerTransport, Message};
use crate::{BrokerError, Result};

/// Publishes integration events to the destinations configured for them.
#[derive(Clone)]
pub struct MessageBroker {
    transport: Arc<dyn BrokerTransport>,
    destinations: DestinationTable,
}

impl MessageBroker {
    pub fn new(transport: Arc<dyn BrokerTransport>, destinations: DestinationTable) -> Self {
        Self {
            transport,
            destinations,
        }
    }

    pub fn destinations(&self) -> &DestinationTable {
        &self.destinations
    }

    /// Serializes the event and publishes it to its mapped exchange.
    ///
    /// Fails with [`BrokerError::MissingDestination`] when the event name has
    /// no route. Transport failures are returned unchanged.
    #[tracing::instrument(skip(self, event), fields(event_name = %event.event_name))]
    pub async fn publish_event(&self, event: &IntegrationEvent) -> Result<()> {
        let destination = self.destinations.get(&event.event_name).ok_or_else(|| {
            BrokerError::MissingDestination {
                event_name: event.event_name.clone(),
            }
        })?;

        let message = Message::json(event)?.with_correlation_id(uuid::Uuid::new_v4().to_string());
        self.transport
            .publish(&destination.exchange, &destination.routing_key, message)
            .await?;

        metrics::counter!("broker_messages_published_total").increment(1);
        tracing::debug!(
            exchange = %destination.exchange,
            routing_key = %destination.routing_key,
            "integration event published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DIRECT_EXCHANGE, InMemoryBroker};
    use chrono::Utc;

    fn event(name: &str) -> IntegrationEvent {
        IntegrationEvent {
            event_version: 1,
            event_name: name.to_string(),
            occurred_on: Utc::now(),
            payload: serde_json::json!({"id": "42"}),
        }
    }

    fn broker(transport: &InMemoryBroker) -> MessageBroker {
        MessageBroker::new(
            Arc::new(transport.clone()),
            DestinationTable::new().route(
                "CategoryCreatedIntegrationEvent",
                DIRECT_EXCHANGE,
                "categories.created",
            ),
        )
    }

    #[tokio::test]
    async fn publishes_to_the_mapped_destination() {
        let transport = InMemoryBroker::new();
        let broker = broker(&transport);

        broker
            .publish_event(&event("CategoryCreatedIntegrationEvent"))
            .await
            .unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].exchange, DIRECT_EXCHANGE);
        assert_eq!(published[0].routing_key, "categories.created");
        assert!(published[0].message.correlation_id.is_some());

        let decoded: IntegrationEvent = serde_json::from_slice(&published[0].message.body).unwrap();
        assert_eq!(decoded.event_name, "CategoryCreatedIntegrationEvent");
    }

    #[tokio::test]
    async fn missing_destination_fails_loudly() {
        let transport = InMemoryBroker::new();
        let err = broker(&transport)
            .publish_event(&event("Unmapped"))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::MissingDestination { .. }));
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let transport = InMemoryBroker::new();
        transport.set_fail_on_publish(true);
        let err = broker(&transport)
            .publish_event(&event("CategoryCreatedIntegrationEvent"))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::Unavailable(_)));
    }
}

use std::sync::Arc;

use common::ErrorKind;
use domain::IntegrationEvent;
use futures_util::StreamExt;

use crate::Result;
use crate::error::HandlerError;
use crate::mediator::IntegrationEventHandler;
use crate::retry::{Disposition, RetryFilter, RetryPolicy};
use crate::transport::{BrokerTransport, Delivery};

/// Consumes integration events from one queue.
///
/// Every delivery is decoded, passed to the handler through the
/// [`RetryFilter`], and then acked or rejected.
pub struct IntegrationEventConsumer {
    transport: Arc<dyn BrokerTransport>,
    queue: String,
    handler: Arc<dyn IntegrationEventHandler>,
    filter: RetryFilter,
}

impl IntegrationEventConsumer {
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        queue: impl Into<String>,
        handler: Arc<dyn IntegrationEventHandler>,
        policy: RetryPolicy,
    ) -> Self {
        let queue = queue.into();
        Self {
            filter: RetryFilter::new(Arc::clone(&transport), queue.clone(), policy),
            transport,
            queue,
            handler,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Handles one delivery and settles it with the broker.
    #[tracing::instrument(
        skip(self, delivery),
        fields(queue = %self.queue, delivery_tag = delivery.delivery_tag)
    )]
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Result<Disposition> {
        let handling = async {
            let event = decode(delivery)?;
            tracing::debug!(event_name = %event.event_name, "integration event received");
            self.handler.handle(&event).await
        };

        let disposition = self.filter.filter(delivery, handling).await;
        match disposition {
            Disposition::Ack => self.transport.ack(delivery).await?,
            Disposition::Reject { requeue } => self.transport.reject(delivery, requeue).await?,
        }
        Ok(disposition)
    }

    /// Consumes the queue until the delivery stream ends.
    ///
    /// A delivery that cannot be settled is logged and skipped.
    pub async fn run(&self) -> Result<()> {
        let mut deliveries = self.transport.subscribe(&self.queue).await?;
        tracing::info!(queue = %self.queue, "consumer started");

        while let Some(delivery) = deliveries.next().await {
            if let Err(error) = self.handle_delivery(&delivery).await {
                tracing::error!(
                    queue = %self.queue,
                    delivery_tag = delivery.delivery_tag,
                    %error,
                    "failed to settle delivery"
                );
                metrics::counter!("consumer_settle_failures_total").increment(1);
            }
        }

        tracing::info!(queue = %self.queue, "consumer stopped");
        Ok(())
    }
}

fn decode(delivery: &Delivery) -> std::result::Result<IntegrationEvent, HandlerError> {
    serde_json::from_slice(&delivery.message.body).map_err(|e| {
        HandlerError::with_kind(
            ErrorKind::MalformedRequest,
            format!("invalid integration event: {e}"),
        )
    })
}

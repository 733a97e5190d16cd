//! Retry / dead-letter decision for failed inbound handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::HasErrorKind;

use crate::error::HandlerError;
use crate::memory::DELAYED_EXCHANGE;
use crate::transport::{BrokerTransport, Delivery, Message};

/// Bounds on redelivery of a failed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Redeliveries allowed before the message is dead-lettered.
    pub max_retries: u32,
    /// Delay requested from the delayed exchange on each redelivery.
    pub delay: Duration,
    /// Exchange that holds messages for `x-delay` before routing them.
    pub delayed_exchange: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(5000),
            delayed_exchange: DELAYED_EXCHANGE.to_string(),
        }
    }
}

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Reject { requeue: bool },
}

/// Wraps an inbound handler and turns its outcome into a [`Disposition`].
///
/// Non-retriable failures and failures past the retry cap are rejected
/// without requeue. Other failures are republished to the delayed exchange
/// with `x-retry-count` incremented and the original is acked. The retry is
/// routed with the queue name as key, so it only comes back to the queue that
/// failed. The delayed exchange must bind each queue under its own name.
///
/// If the republish fails the original is requeued. Requeues cannot carry a
/// new header, so they are counted here per message and added to
/// `x-retry-count` when checking the cap.
#[derive(Clone)]
pub struct RetryFilter {
    transport: Arc<dyn BrokerTransport>,
    queue: String,
    policy: RetryPolicy,
    requeues: Arc<Mutex<HashMap<String, u32>>>,
}

impl RetryFilter {
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        queue: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            queue: queue.into(),
            policy,
            requeues: Arc::default(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    fn requeues(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.requeues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settled(&self, message: &Message) {
        self.requeues().remove(&message_key(message));
    }

    /// Awaits `handling` and decides the disposition of `delivery`.
    pub async fn filter<Fut>(&self, delivery: &Delivery, handling: Fut) -> Disposition
    where
        Fut: Future<Output = Result<(), HandlerError>> + Send,
    {
        match handling.await {
            Ok(()) => {
                self.settled(&delivery.message);
                Disposition::Ack
            }
            Err(error) => self.on_failure(delivery, &error).await,
        }
    }

    #[tracing::instrument(
        skip(self, delivery, error),
        fields(queue = %self.queue, kind = %error.kind())
    )]
    pub async fn on_failure(&self, delivery: &Delivery, error: &HandlerError) -> Disposition {
        let retry_count = delivery.message.headers.retry_count();
        let key = message_key(&delivery.message);
        let requeued = self.requeues().get(&key).copied().unwrap_or(0);

        if !error.kind().is_retriable() {
            tracing::warn!(%error, retry_count, "non-retriable failure, dead-lettering");
            return self.dead_letter(&key);
        }

        if retry_count.saturating_add(requeued) >= self.policy.max_retries {
            tracing::warn!(%error, retry_count, requeued, "retries exhausted, dead-lettering");
            return self.dead_letter(&key);
        }

        let mut message = delivery.message.clone();
        message.headers.set_retry_count(retry_count + 1);
        message
            .headers
            .set_delay_ms(u64::try_from(self.policy.delay.as_millis()).unwrap_or(u64::MAX));

        match self
            .transport
            .publish(&self.policy.delayed_exchange, &self.queue, message)
            .await
        {
            Ok(()) => {
                self.requeues().remove(&key);
                tracing::info!(%error, retry_count = retry_count + 1, "message scheduled for retry");
                metrics::counter!("consumer_messages_retried_total").increment(1);
                Disposition::Ack
            }
            Err(publish_error) => {
                *self.requeues().entry(key).or_insert(0) += 1;
                tracing::error!(%error, %publish_error, "retry republish failed, requeueing");
                metrics::counter!("consumer_messages_requeued_total").increment(1);
                Disposition::Reject { requeue: true }
            }
        }
    }

    fn dead_letter(&self, key: &str) -> Disposition {
        self.requeues().remove(key);
        metrics::counter!("consumer_messages_dead_lettered_total").increment(1);
        Disposition::Reject { requeue: false }
    }
}

// Correlation id when present, else the body.
fn message_key(message: &Message) -> String {
    match &message.correlation_id {
        Some(id) => id.clone(),
        None => String::from_utf8_lossy(&message.body).into_owned(),
    }
}

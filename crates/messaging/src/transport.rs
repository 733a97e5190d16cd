//! Broker transport contract and the message types that cross it.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// Header holding the number of redeliveries already attempted.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Header read by delayed exchanges, in milliseconds.
pub const DELAY_HEADER: &str = "x-delay";

/// Message headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageHeaders(BTreeMap<String, Value>);

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Redeliveries attempted so far. Absent or non-numeric counts as 0.
    pub fn retry_count(&self) -> u32 {
        self.get(RETRY_COUNT_HEADER)
            .and_then(Value::as_u64)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0)
    }

    pub fn set_retry_count(&mut self, count: u32) {
        self.insert(RETRY_COUNT_HEADER, count);
    }

    pub fn delay_ms(&self) -> Option<u64> {
        self.get(DELAY_HEADER).and_then(Value::as_u64)
    }

    pub fn set_delay_ms(&mut self, delay: u64) {
        self.insert(DELAY_HEADER, delay);
    }
}

/// A message body together with its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub headers: MessageHeaders,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
}

impl Message {
    /// Creates a message with an opaque body and no properties.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            headers: MessageHeaders::new(),
            correlation_id: None,
            content_type: None,
        }
    }

    /// Serializes `value` as a JSON message.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        let mut message = Self::new(serde_json::to_vec(value)?);
        message.content_type = Some("application/json".to_string());
        Ok(message)
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A message handed to a consumer. Must be acked or rejected exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub message: Message,
}

/// Stream of deliveries for one queue.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Delivery> + Send>>;

/// Minimal AMQP-style broker operations.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Publishes a message to an exchange.
    async fn publish(&self, exchange: &str, routing_key: &str, message: Message) -> Result<()>;

    /// Attaches the single consumer of a queue.
    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream>;

    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Rejects a delivery. Without requeue the message is dead-lettered.
    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_retry_header_counts_as_zero() {
        let headers = MessageHeaders::new();
        assert_eq!(headers.retry_count(), 0);
        assert_eq!(headers.delay_ms(), None);
    }

    #[test]
    fn malformed_retry_header_counts_as_zero() {
        let mut headers = MessageHeaders::new();
        headers.insert(RETRY_COUNT_HEADER, "two");
        assert_eq!(headers.retry_count(), 0);
    }

    #[test]
    fn retry_headers_round_trip() {
        let mut headers = MessageHeaders::new();
        headers.set_retry_count(2);
        headers.set_delay_ms(5000);
        assert_eq!(headers.retry_count(), 2);
        assert_eq!(headers.delay_ms(), Some(5000));
    }

    #[test]
    fn json_message_sets_content_type() {
        let message = Message::json(&serde_json::json!({"a": 1}))
            .unwrap()
            .with_correlation_id("abc");
        assert_eq!(message.content_type.as_deref(), Some("application/json"));
        assert_eq!(message.correlation_id.as_deref(), Some("abc"));
        assert_eq!(message.body, br#"{"a":1}"#);
    }
}

//! In-memory broker for tests and database-less runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::transport::{BrokerTransport, Delivery, DeliveryStream, Message};
use crate::{BrokerError, Result};

/// Default direct exchange.
pub const DIRECT_EXCHANGE: &str = "amq.direct";

/// Default delayed-message exchange.
pub const DELAYED_EXCHANGE: &str = "direct.delayed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routes immediately by exact routing key.
    Direct,
    /// Holds messages for `x-delay` milliseconds, then routes like `Direct`.
    Delayed,
}

/// A message accepted by [`InMemoryBroker::publish`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub message: Message,
}

#[derive(Debug)]
struct Binding {
    exchange: String,
    routing_key: String,
    queue: String,
}

#[derive(Debug)]
struct Queue {
    sender: UnboundedSender<Delivery>,
    receiver: Option<UnboundedReceiver<Delivery>>,
    dead_letter_queue: Option<String>,
}

#[derive(Debug, Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeKind>,
    bindings: Vec<Binding>,
    queues: HashMap<String, Queue>,
    // delivery tag -> queue it was delivered from
    unacked: HashMap<u64, String>,
    published: Vec<PublishedMessage>,
    dead_letters: Vec<Delivery>,
    next_tag: u64,
    fail_on_publish: bool,
}

impl BrokerState {
    fn enqueue(&mut self, queue: &str, mut delivery: Delivery) {
        let Some(target) = self.queues.get(queue) else {
            return;
        };
        self.next_tag += 1;
        delivery.delivery_tag = self.next_tag;
        if target.sender.send(delivery).is_ok() {
            self.unacked.insert(self.next_tag, queue.to_string());
        }
    }

    fn route(&mut self, exchange: &str, routing_key: &str, message: &Message) {
        let targets: Vec<String> = self
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && b.routing_key == routing_key)
            .map(|b| b.queue.clone())
            .collect();

        if targets.is_empty() {
            tracing::debug!(exchange, routing_key, "message unroutable, dropped");
        }

        for queue in targets {
            let delivery = Delivery {
                delivery_tag: 0,
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                redelivered: false,
                message: message.clone(),
            };
            self.enqueue(&queue, delivery);
        }
    }

    fn settle(&mut self, delivery: &Delivery) -> Result<String> {
        self.unacked
            .remove(&delivery.delivery_tag)
            .ok_or(BrokerError::UnknownDelivery(delivery.delivery_tag))
    }
}

/// In-memory AMQP-style broker.
///
/// Supports direct and delayed exchanges, queue bindings, a dead-letter queue
/// per queue, ack/reject and failure injection. Cloning yields another handle
/// to the same broker.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates a broker with `amq.direct` and `direct.delayed` declared.
    pub fn new() -> Self {
        let broker = Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
        };
        broker.declare_exchange(DIRECT_EXCHANGE, ExchangeKind::Direct);
        broker.declare_exchange(DELAYED_EXCHANGE, ExchangeKind::Delayed);
        broker
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn declare_exchange(&self, name: impl Into<String>, kind: ExchangeKind) {
        self.lock().exchanges.insert(name.into(), kind);
    }

    /// Declares a queue. Redeclaring an existing queue is a no-op.
    pub fn declare_queue(&self, name: impl Into<String>) {
        self.declare_queue_inner(name.into(), None);
    }

    /// Declares a queue whose rejected messages go to `dead_letter_queue`.
    pub fn declare_queue_with_dead_letter(
        &self,
        name: impl Into<String>,
        dead_letter_queue: impl Into<String>,
    ) {
        let dead_letter_queue = dead_letter_queue.into();
        self.declare_queue_inner(dead_letter_queue.clone(), None);
        self.declare_queue_inner(name.into(), Some(dead_letter_queue));
    }

    fn declare_queue_inner(&self, name: String, dead_letter_queue: Option<String>) {
        let mut state = self.lock();
        if state.queues.contains_key(&name) {
            return;
        }
        let (sender, receiver) = unbounded_channel();
        state.queues.insert(
            name,
            Queue {
                sender,
                receiver: Some(receiver),
                dead_letter_queue,
            },
        );
    }

    pub fn bind(
        &self,
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Result<()> {
        let (queue, exchange) = (queue.into(), exchange.into());
        let mut state = self.lock();
        if !state.queues.contains_key(&queue) {
            return Err(BrokerError::UnknownQueue(queue));
        }
        if !state.exchanges.contains_key(&exchange) {
            return Err(BrokerError::UnknownExchange(exchange));
        }
        state.bindings.push(Binding {
            exchange,
            routing_key: routing_key.into(),
            queue,
        });
        Ok(())
    }

    /// Configures publish to fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.lock().fail_on_publish = fail;
    }

    /// Every message accepted so far, in publish order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Messages rejected without requeue, in rejection order.
    pub fn dead_letters(&self) -> Vec<Delivery> {
        self.lock().dead_letters.clone()
    }

    /// Deliveries handed out and not yet acked or rejected.
    pub fn unacked_count(&self) -> usize {
        self.lock().unacked.len()
    }

    /// Takes the next ready delivery from a queue that has no consumer.
    pub fn try_receive(&self, queue: &str) -> Result<Option<Delivery>> {
        let mut state = self.lock();
        let entry = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        let receiver = entry
            .receiver
            .as_mut()
            .ok_or_else(|| BrokerError::AlreadyConsumed(queue.to_string()))?;
        Ok(receiver.try_recv().ok())
    }

    fn schedule(&self, delay: Duration, exchange: String, routing_key: String, message: Message) {
        let broker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            broker.lock().route(&exchange, &routing_key, &message);
        });
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    #[tracing::instrument(skip(self, message))]
    async fn publish(&self, exchange: &str, routing_key: &str, message: Message) -> Result<()> {
        let kind = {
            let mut state = self.lock();
            if state.fail_on_publish {
                return Err(BrokerError::Unavailable(
                    "simulated broker outage".to_string(),
                ));
            }
            let kind = *state
                .exchanges
                .get(exchange)
                .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_string()))?;

            state.published.push(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                message: message.clone(),
            });

            match (kind, message.headers.delay_ms()) {
                (ExchangeKind::Delayed, Some(delay)) if delay > 0 => Some(delay),
                _ => {
                    state.route(exchange, routing_key, &message);
                    None
                }
            }
        };

        if let Some(delay) = kind {
            self.schedule(
                Duration::from_millis(delay),
                exchange.to_string(),
                routing_key.to_string(),
                message,
            );
        }
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream> {
        let mut state = self.lock();
        let entry = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        let receiver = entry
            .receiver
            .take()
            .ok_or_else(|| BrokerError::AlreadyConsumed(queue.to_string()))?;

        Ok(Box::pin(futures_util::stream::unfold(
            receiver,
            |mut receiver| async move { receiver.recv().await.map(|d| (d, receiver)) },
        )))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.lock().settle(delivery)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, delivery), fields(delivery_tag = delivery.delivery_tag))]
    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        let mut state = self.lock();
        let queue = state.settle(delivery)?;

        if requeue {
            let mut redelivery = delivery.clone();
            redelivery.redelivered = true;
            state.enqueue(&queue, redelivery);
            return Ok(());
        }

        state.dead_letters.push(delivery.clone());
        let dead_letter_queue = state
            .queues
            .get(&queue)
            .and_then(|q| q.dead_letter_queue.clone());
        if let Some(dlq) = dead_letter_queue {
            state.enqueue(&dlq, delivery.clone());
        }
        Ok(())
    }
}

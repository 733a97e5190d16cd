use common::{ErrorKind, HasErrorKind};
use thiserror::Error;

/// Errors raised while talking to the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No exchange/routing key is configured for the event name.
    #[error("No destination configured for event {event_name}")]
    MissingDestination { event_name: String },

    /// The broker is unreachable or refused the operation.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// The queue already has a consumer attached.
    #[error("Queue {0} is already being consumed")]
    AlreadyConsumed(String),

    /// Ack or reject for a delivery the broker does not track.
    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    /// The outbound message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HasErrorKind for BrokerError {
    fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::MissingDestination { .. }
            | BrokerError::AlreadyConsumed(_)
            | BrokerError::UnknownDelivery(_)
            | BrokerError::Serialization(_) => ErrorKind::Programming,
            BrokerError::Unavailable(_)
            | BrokerError::UnknownExchange(_)
            | BrokerError::UnknownQueue(_) => ErrorKind::Broker,
        }
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Failure reported by an event handler.
///
/// Keeps the [`ErrorKind`] of the underlying error so the retry filter can
/// classify it without inspecting the concrete type.
#[derive(Debug, Error)]
#[error("{inner}")]
pub struct HandlerError {
    kind: ErrorKind,
    inner: Box<dyn std::error::Error + Send + Sync>,
}

impl HandlerError {
    /// Wraps a classified error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + HasErrorKind + Send + Sync + 'static,
    {
        Self {
            kind: error.kind(),
            inner: Box::new(error),
        }
    }

    /// Creates an error from a kind and a message.
    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            kind,
            inner: message.into(),
        }
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl HasErrorKind for HandlerError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<BrokerError> for HandlerError {
    fn from(error: BrokerError) -> Self {
        Self::new(error)
    }
}

/// Errors raised while dispatching domain events.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// A handler failed. The event stays marked as dispatched.
    #[error("Handler for {event_name} failed: {source}")]
    Handler {
        event_name: String,
        #[source]
        source: HandlerError,
    },
}

impl HasErrorKind for MediatorError {
    fn kind(&self) -> ErrorKind {
        match self {
            MediatorError::Handler { source, .. } => source.kind(),
        }
    }
}

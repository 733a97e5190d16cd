//! Startup errors of the server process.

use messaging::BrokerError;
use persistence::PersistenceError;
use thiserror::Error;

/// Errors that stop the server before or while it serves.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Failed to connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

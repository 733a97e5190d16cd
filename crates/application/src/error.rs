use common::{ErrorKind, HasErrorKind};
use domain::DomainError;
use messaging::{BrokerError, HandlerError, MediatorError};
use persistence::PersistenceError;
use thiserror::Error;

/// Errors returned by use cases and the application service.
///
/// Wrapped errors are transparent so the error a use case raised reaches the
/// caller with its message intact.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Mediator(#[from] MediatorError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Domain handlers kept producing events after the last allowed pass.
    #[error("Domain events still pending after {passes} dispatch passes")]
    DispatchLimitExceeded { passes: usize },
}

impl HasErrorKind for ApplicationError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::Domain(e) => e.kind(),
            ApplicationError::Persistence(e) => e.kind(),
            ApplicationError::Mediator(e) => e.kind(),
            ApplicationError::Broker(e) => e.kind(),
            ApplicationError::DispatchLimitExceeded { .. } => ErrorKind::Programming,
        }
    }
}

impl From<ApplicationError> for HandlerError {
    fn from(error: ApplicationError) -> Self {
        HandlerError::new(error)
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, ApplicationError>;

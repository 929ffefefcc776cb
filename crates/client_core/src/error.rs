use std::time::Duration;

use shared::{domain::RecordId, validation::ValidationError};
use thiserror::Error;

/// Why a request to the record service did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("service responded with status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("request cancelled: record manager was unmounted")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("record {0} not found")]
    NotFound(RecordId),
    #[error("request failed: {0}")]
    Request(#[from] RequestFailure),
}

impl ManagerError {
    /// Whether re-issuing the same operation may succeed without changing
    /// the input or reloading first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ManagerError::Request(
                RequestFailure::Transport(_)
                    | RequestFailure::Timeout(_)
                    | RequestFailure::Service { .. }
            )
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ManagerError::Request(RequestFailure::Cancelled))
    }
}

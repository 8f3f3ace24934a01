use trainer_shared::errors::{NotLoggedInError, ValidationError};

/// Failure of a client operation
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally, no request was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotLoggedIn(#[from] NotLoggedInError),
    #[error("request failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl ClientError {
    /// Returns `true` if the error was caught before anything was sent
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(..))
    }
}

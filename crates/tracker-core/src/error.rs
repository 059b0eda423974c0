use thiserror::Error;

use crate::UserId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// Network failure, timeout, unexpected status or malformed payload from the price feed.
    #[error("Price fetch error: {0}")]
    Fetch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("User {0} is not tracking")]
    NotTracking(UserId),
}

impl TrackerError {
    pub fn is_fetch(&self) -> bool {
        matches!(self, TrackerError::Fetch(_))
    }
}

use async_trait::async_trait;

use crate::{TrackerError, UserId};

/// Source of the current price of the tracked asset.
///
/// Implementations never retry; every failure is reported as [`TrackerError::Fetch`].
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<f64, TrackerError>;
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, user: UserId, text: &str) -> Result<(), TrackerError>;
    fn name(&self) -> &str;
}

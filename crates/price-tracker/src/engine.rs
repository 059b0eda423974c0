use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracker_core::{
    Dispatcher, Notification, PriceSource, PriceStats, TrackerError, Trend, UserId,
};

use crate::history::{PriceHistory, DEFAULT_CAPACITY};
use crate::messages;
use crate::registry::AlertRegistry;

pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between the end of one tick and the start of the next.
    pub interval: Duration,
    pub history_capacity: usize,
    /// Display name used in outgoing messages.
    pub asset_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            history_capacity: DEFAULT_CAPACITY,
            asset_name: "Worldcoin".to_string(),
        }
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The feed had no price; nothing was recorded or sent.
    NoPrice,
    Completed {
        price: f64,
        delivered: usize,
        failed: usize,
    },
}

/// Owns the price history and user registry and drives the poll loop.
pub struct TrackingEngine {
    source: Arc<dyn PriceSource>,
    registry: AlertRegistry,
    history: RwLock<PriceHistory>,
    config: EngineConfig,
}

impl TrackingEngine {
    pub fn new(source: Arc<dyn PriceSource>, config: EngineConfig) -> Self {
        Self {
            registry: AlertRegistry::new(Arc::clone(&source)),
            history: RwLock::new(PriceHistory::new(config.history_capacity)),
            source,
            config,
        }
    }

    pub fn registry(&self) -> &AlertRegistry {
        &self.registry
    }

    pub fn asset_name(&self) -> &str {
        &self.config.asset_name
    }

    /// Fresh quote straight from the feed, bypassing the history.
    pub async fn current_price(&self) -> Result<f64, TrackerError> {
        self.source.fetch().await
    }

    pub async fn trend(&self) -> Option<Trend> {
        self.history.read().await.trend()
    }

    pub async fn stats(&self) -> Option<PriceStats> {
        self.history.read().await.stats()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    /// Fetch a price, record it and collect every notification it triggers.
    ///
    /// For each user the increase notification (if any) precedes target alerts.
    pub async fn poll(&self) -> Result<(f64, Vec<Notification>), TrackerError> {
        let price = self.source.fetch().await?;

        self.history.write().await.append(price);

        let mut notifications = Vec::new();
        for user in self.registry.tracked_users() {
            notifications.extend(self.evaluate_user(user, price));
        }

        Ok((price, notifications))
    }

    fn evaluate_user(&self, user: UserId, price: f64) -> Vec<Notification> {
        let mut out = Vec::new();
        if let Some(increase) = self.registry.check_increase(user, price) {
            out.push(increase);
        }
        out.extend(self.registry.evaluate(user, price));
        out
    }

    /// Run one poll and deliver the results. Delivery failures are logged per message.
    pub async fn tick(&self, dispatcher: &dyn Dispatcher) -> TickOutcome {
        let (price, notifications) = match self.poll().await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("No price available this tick: {}", e);
                return TickOutcome::NoPrice;
            }
        };

        let mut delivered = 0;
        let mut failed = 0;
        for notification in &notifications {
            let text = messages::render_notification(&self.config.asset_name, notification);
            match dispatcher.send(notification.user_id, &text).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!(
                        "Sent notification to {} via {}",
                        notification.user_id,
                        dispatcher.name()
                    );
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!("Message send error to {}: {}", notification.user_id, e);
                }
            }
        }

        tracing::debug!(
            "Tick complete: price {} | {} delivered, {} failed",
            price,
            delivered,
            failed
        );

        TickOutcome::Completed {
            price,
            delivered,
            failed,
        }
    }

    /// Fixed-delay poll loop. Each tick runs in its own task so a panic inside it is
    /// logged instead of ending the loop. Returns once `shutdown` flips to true or its
    /// sender is dropped.
    pub async fn run(
        self: Arc<Self>,
        dispatcher: Arc<dyn Dispatcher>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            "Price tracking loop started (every {}s)",
            self.config.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let engine = Arc::clone(&self);
            let tick_dispatcher = Arc::clone(&dispatcher);
            let handle = tokio::spawn(async move { engine.tick(tick_dispatcher.as_ref()).await });

            if let Err(e) = handle.await {
                tracing::error!("Continuous check error: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Price tracking loop stopped");
    }

    pub fn spawn(
        self: Arc<Self>,
        dispatcher: Arc<dyn Dispatcher>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(dispatcher, shutdown))
    }
}

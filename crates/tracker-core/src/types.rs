use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a chat user (the transport's chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

/// A single observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PriceSample {
    pub fn now(price: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            price,
        }
    }
}

/// One-shot target alert. `triggered` only ever goes from false to true.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub target: f64,
    pub triggered: bool,
}

impl Alert {
    pub fn new(target: f64) -> Self {
        Self {
            target,
            triggered: false,
        }
    }
}

/// Per-user tracking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTrackingState {
    pub tracking: bool,
    /// Whole-unit price of the last increase notification (or the seed price).
    pub last_notified_price: i64,
    pub alerts: Vec<Alert>,
}

impl UserTrackingState {
    pub fn seeded(price: f64) -> Self {
        Self {
            tracking: true,
            last_notified_price: whole_units(price),
            alerts: Vec::new(),
        }
    }
}

/// Truncate a price to whole currency units.
pub fn whole_units(price: f64) -> i64 {
    price.floor() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    StrongUp,
    SlightUp,
    Stable,
    SlightDown,
    StrongDown,
}

impl TrendDirection {
    /// Classify a percentage change. The 5% bands are inclusive on the "slight" side.
    pub fn from_change(change_percent: f64) -> Self {
        match change_percent {
            c if c > 5.0 => TrendDirection::StrongUp,
            c if c > 0.0 => TrendDirection::SlightUp,
            c if c < -5.0 => TrendDirection::StrongDown,
            c if c < 0.0 => TrendDirection::SlightDown,
            _ => TrendDirection::Stable,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            TrendDirection::StrongUp => "Strong Upward Trend",
            TrendDirection::SlightUp => "Slight Upward Trend",
            TrendDirection::Stable => "Stable Price",
            TrendDirection::SlightDown => "Slight Downward Trend",
            TrendDirection::StrongDown => "Strong Downward Trend",
        }
    }
}

/// Drift between the oldest and newest retained samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub current: f64,
    pub high: f64,
    pub low: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Price rose by at least one whole unit since the last increase notification.
    PriceIncrease { price: f64 },
    TargetReached { price: f64, target: f64 },
}

/// An outbound message addressed to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn price_increase(user_id: UserId, price: f64) -> Self {
        Self {
            user_id,
            kind: NotificationKind::PriceIncrease { price },
        }
    }

    pub fn target_reached(user_id: UserId, price: f64, target: f64) -> Self {
        Self {
            user_id,
            kind: NotificationKind::TargetReached { price, target },
        }
    }
}

use std::collections::VecDeque;

use tracker_core::{PriceSample, PriceStats, Trend, TrendDirection};

pub const DEFAULT_CAPACITY: usize = 24;
/// Largest window accepted from configuration.
pub const MAX_CAPACITY: usize = 10_000;

/// Fixed-size window of the most recent price samples, oldest first.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    samples: VecDeque<PriceSample>,
    capacity: usize,
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY) + 1),
            capacity,
        }
    }

    pub fn append(&mut self, price: f64) {
        self.samples.push_back(PriceSample::now(price));
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.price).collect()
    }

    /// Drift from the oldest retained sample to the newest one.
    ///
    /// Returns `None` with fewer than two samples, or when the oldest price is zero
    /// and no percentage can be formed.
    pub fn trend(&self) -> Option<Trend> {
        if self.samples.len() < 2 {
            return None;
        }

        let oldest = self.samples.front()?.price;
        let newest = self.samples.back()?.price;
        if oldest == 0.0 {
            return None;
        }

        let change_percent = (newest - oldest) / oldest * 100.0;
        Some(Trend {
            direction: TrendDirection::from_change(change_percent),
            change_percent,
        })
    }

    pub fn stats(&self) -> Option<PriceStats> {
        let current = self.samples.back()?.price;

        let (high, low, sum) = self.samples.iter().fold(
            (f64::MIN, f64::MAX, 0.0),
            |(high, low, sum), s| (high.max(s.price), low.min(s.price), sum + s.price),
        );

        Some(PriceStats {
            current,
            high,
            low,
            average: sum / self.samples.len() as f64,
        })
    }
}

//! In-memory fakes for the engine's collaborators.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracker_core::{Dispatcher, PriceSource, TrackerError, UserId};

/// Price source whose quote can be changed (or made to fail) between calls.
pub struct ScriptedSource {
    price: Mutex<Option<f64>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn at(price: f64) -> Self {
        Self {
            price: Mutex::new(Some(price)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            price: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = Some(price);
    }

    pub fn fail(&self) {
        *self.price.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch(&self) -> Result<f64, TrackerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let price = *self.price.lock().unwrap();
        price.ok_or_else(|| TrackerError::Fetch("feed unavailable".to_string()))
    }
}

/// Dispatcher that records every message and can refuse delivery to chosen users.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(UserId, String)>>,
    unreachable: Mutex<HashSet<UserId>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, user: UserId) {
        self.unreachable.lock().unwrap().insert(user);
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, user: UserId, text: &str) -> Result<(), TrackerError> {
        if self.unreachable.lock().unwrap().contains(&user) {
            return Err(TrackerError::Delivery(format!("chat {} not found", user)));
        }
        self.sent.lock().unwrap().push((user, text.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

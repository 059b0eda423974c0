use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracker_core::{
    whole_units, Alert, Notification, PriceSource, TrackerError, UserId, UserTrackingState,
};

/// Per-user tracking records, shared by the poll loop and command handlers.
///
/// Every operation takes the entry (or shard) lock for the duration of a single
/// synchronous mutation, so no reader sees a half-built record. Locks are never held
/// while waiting on the price source.
pub struct AlertRegistry {
    users: DashMap<UserId, UserTrackingState>,
    source: Arc<dyn PriceSource>,
}

impl AlertRegistry {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            users: DashMap::new(),
            source,
        }
    }

    /// Register a user, seeding the increase threshold from a fresh quote.
    ///
    /// Returns false if the user is already registered or the quote could not be fetched.
    pub async fn start_tracking(&self, user: UserId) -> bool {
        if self.users.contains_key(&user) {
            return false;
        }

        let price = match self.source.fetch().await {
            Ok(price) => price,
            Err(e) => {
                tracing::error!("Failed to start price tracking for user {}: {}", user, e);
                return false;
            }
        };

        // Another handler may have registered the user while we were fetching.
        match self.users.entry(user) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(UserTrackingState::seeded(price));
                tracing::info!("Started price tracking for user {}", user);
                true
            }
        }
    }

    /// Remove the user's record, alerts included.
    pub fn stop_tracking(&self, user: UserId) -> bool {
        let removed = self.users.remove(&user).is_some();
        if removed {
            tracing::info!("Stopped price tracking for user {}", user);
        }
        removed
    }

    /// Append a one-shot alert, registering the user first if needed.
    pub async fn add_alert(&self, user: UserId, target: f64) -> Result<(), TrackerError> {
        validate_target(target)?;

        if let Some(mut state) = self.users.get_mut(&user) {
            state.alerts.push(Alert::new(target));
            return Ok(());
        }

        let price = self.source.fetch().await?;
        self.users
            .entry(user)
            .or_insert_with(|| UserTrackingState::seeded(price))
            .alerts
            .push(Alert::new(target));

        tracing::info!("Registered user {} with alert at {}", user, target);
        Ok(())
    }

    /// Fire every pending alert whose target is at or below `price`, in registration order.
    pub fn evaluate(&self, user: UserId, price: f64) -> Vec<Notification> {
        let Some(mut state) = self.users.get_mut(&user) else {
            return Vec::new();
        };

        state
            .alerts
            .iter_mut()
            .filter(|alert| !alert.triggered && price >= alert.target)
            .map(|alert| {
                alert.triggered = true;
                Notification::target_reached(user, price, alert.target)
            })
            .collect()
    }

    /// Whole-unit increase check for a tracking user. Moves the threshold up when it fires.
    pub fn check_increase(&self, user: UserId, price: f64) -> Option<Notification> {
        let mut state = self.users.get_mut(&user)?;
        if !state.tracking {
            return None;
        }

        let units = whole_units(price);
        if units > state.last_notified_price {
            state.last_notified_price = units;
            Some(Notification::price_increase(user, price))
        } else {
            None
        }
    }

    pub fn list_alerts(&self, user: UserId) -> Vec<Alert> {
        self.users
            .get(&user)
            .map(|state| state.alerts.clone())
            .unwrap_or_default()
    }

    pub fn is_tracking(&self, user: UserId) -> bool {
        self.users
            .get(&user)
            .map(|state| state.tracking)
            .unwrap_or(false)
    }

    /// Copy of a user's full record.
    pub fn snapshot(&self, user: UserId) -> Result<UserTrackingState, TrackerError> {
        self.users
            .get(&user)
            .map(|state| state.clone())
            .ok_or(TrackerError::NotTracking(user))
    }

    /// Users with the tracking flag set at the time of the call.
    pub fn tracked_users(&self) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|entry| entry.value().tracking)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

pub fn validate_target(target: f64) -> Result<(), TrackerError> {
    if !target.is_finite() || target <= 0.0 {
        return Err(TrackerError::Validation(
            "Please enter a positive price value".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSource;
    use tracker_core::NotificationKind;

    const ALICE: UserId = UserId(1001);
    const BOB: UserId = UserId(1002);

    fn registry_at(price: f64) -> (Arc<ScriptedSource>, AlertRegistry) {
        let source = Arc::new(ScriptedSource::at(price));
        let registry = AlertRegistry::new(source.clone());
        (source, registry)
    }

    #[tokio::test]
    async fn test_start_tracking_seeds_floor_price() {
        let (_, registry) = registry_at(2.87);

        assert!(registry.start_tracking(ALICE).await);

        let state = registry.snapshot(ALICE).unwrap();
        assert!(state.tracking);
        assert_eq!(state.last_notified_price, 2);
        assert!(state.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_start_tracking_fails_without_price() {
        let source = Arc::new(ScriptedSource::failing());
        let registry = AlertRegistry::new(source);

        assert!(!registry.start_tracking(ALICE).await);
        assert!(registry.is_empty());
        assert!(!registry.is_tracking(ALICE));
    }

    #[tokio::test]
    async fn test_start_tracking_twice_is_noop() {
        let (source, registry) = registry_at(10.0);

        assert!(registry.start_tracking(ALICE).await);
        source.set_price(20.0);
        assert!(!registry.start_tracking(ALICE).await);

        assert_eq!(registry.snapshot(ALICE).unwrap().last_notified_price, 10);
        // The second call must not even hit the feed.
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_tracking_removes_record() {
        let (_, registry) = registry_at(10.0);
        registry.add_alert(ALICE, 12.0).await.unwrap();

        assert!(registry.stop_tracking(ALICE));
        assert!(registry.list_alerts(ALICE).is_empty());
        assert_eq!(
            registry.snapshot(ALICE).unwrap_err(),
            TrackerError::NotTracking(ALICE)
        );
    }

    #[tokio::test]
    async fn test_stop_tracking_unknown_user() {
        let (_, registry) = registry_at(10.0);
        registry.start_tracking(ALICE).await;

        assert!(!registry.stop_tracking(BOB));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_tracking(ALICE));
    }

    #[tokio::test]
    async fn test_add_alert_rejects_non_positive_targets() {
        let (source, registry) = registry_at(10.0);

        for target in [0.0, -3.5, f64::NAN, f64::INFINITY] {
            let err = registry.add_alert(ALICE, target).await.unwrap_err();
            assert!(matches!(err, TrackerError::Validation(_)));
        }
        assert!(registry.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_add_alert_registers_unknown_user() {
        let (_, registry) = registry_at(40.7);

        registry.add_alert(ALICE, 50.0).await.unwrap();

        let state = registry.snapshot(ALICE).unwrap();
        assert!(state.tracking);
        assert_eq!(state.last_notified_price, 40);
        assert_eq!(state.alerts, vec![Alert::new(50.0)]);
    }

    #[tokio::test]
    async fn test_add_alert_surfaces_fetch_failure_for_new_user() {
        let source = Arc::new(ScriptedSource::failing());
        let registry = AlertRegistry::new(source);

        let err = registry.add_alert(ALICE, 50.0).await.unwrap_err();
        assert!(err.is_fetch());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_alert_fires_once() {
        let (_, registry) = registry_at(40.0);
        registry.add_alert(ALICE, 50.0).await.unwrap();

        assert!(registry.evaluate(ALICE, 49.0).is_empty());

        let fired = registry.evaluate(ALICE, 50.0);
        assert_eq!(fired, vec![Notification::target_reached(ALICE, 50.0, 50.0)]);

        for _ in 0..3 {
            assert!(registry.evaluate(ALICE, 50.0).is_empty());
        }
        // Falling back below the target does not re-arm it.
        assert!(registry.evaluate(ALICE, 45.0).is_empty());
        assert!(registry.evaluate(ALICE, 55.0).is_empty());
        assert!(registry.list_alerts(ALICE)[0].triggered);
    }

    #[tokio::test]
    async fn test_multiple_alerts_fire_in_registration_order() {
        let (_, registry) = registry_at(10.0);
        registry.add_alert(ALICE, 14.0).await.unwrap();
        registry.add_alert(ALICE, 12.0).await.unwrap();
        registry.add_alert(ALICE, 30.0).await.unwrap();

        let fired = registry.evaluate(ALICE, 15.0);
        let targets: Vec<f64> = fired
            .iter()
            .map(|n| match n.kind {
                NotificationKind::TargetReached { target, .. } => target,
                _ => panic!("unexpected notification {:?}", n),
            })
            .collect();

        assert_eq!(targets, vec![14.0, 12.0]);
        assert!(!registry.list_alerts(ALICE)[2].triggered);
    }

    #[tokio::test]
    async fn test_increase_fires_once_per_whole_unit() {
        let (_, registry) = registry_at(10.2);
        registry.start_tracking(ALICE).await;

        assert_eq!(
            registry.check_increase(ALICE, 11.5),
            Some(Notification::price_increase(ALICE, 11.5))
        );
        assert_eq!(registry.snapshot(ALICE).unwrap().last_notified_price, 11);

        assert!(registry.check_increase(ALICE, 11.8).is_none());
        assert!(registry.check_increase(ALICE, 10.0).is_none());
        assert!(registry.check_increase(ALICE, 12.0).is_some());
    }

    #[tokio::test]
    async fn test_decrease_does_not_lower_threshold() {
        let (_, registry) = registry_at(10.0);
        registry.start_tracking(ALICE).await;

        assert!(registry.check_increase(ALICE, 8.0).is_none());
        assert_eq!(registry.snapshot(ALICE).unwrap().last_notified_price, 10);
        assert!(registry.check_increase(ALICE, 10.9).is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_queries() {
        let (_, registry) = registry_at(10.0);

        assert!(registry.evaluate(BOB, 100.0).is_empty());
        assert!(registry.check_increase(BOB, 100.0).is_none());
        assert!(registry.list_alerts(BOB).is_empty());
        assert!(!registry.is_tracking(BOB));
    }

    #[tokio::test]
    async fn test_tracked_users_snapshot() {
        let (_, registry) = registry_at(10.0);
        registry.start_tracking(ALICE).await;
        registry.start_tracking(BOB).await;

        let mut users = registry.tracked_users();
        users.sort();
        assert_eq!(users, vec![ALICE, BOB]);

        registry.stop_tracking(ALICE);
        assert_eq!(registry.tracked_users(), vec![BOB]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_alert_loses_nothing() {
        let (_, registry) = registry_at(1.0);
        let registry = Arc::new(registry);
        let callers = 64;

        let mut handles = Vec::new();
        for i in 0..callers {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.add_alert(ALICE, 1000.0 + i as f64).await.unwrap();
                // Interleave evaluations that never reach any target.
                registry.evaluate(ALICE, 500.0);
                registry.check_increase(ALICE, 2.0);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let alerts = registry.list_alerts(ALICE);
        assert_eq!(alerts.len(), callers);
        assert!(alerts.iter().all(|a| !a.triggered));
        assert_eq!(registry.len(), 1);
    }
}

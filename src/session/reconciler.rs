//! Canonical snapshot store.
//!
//! Owns the one `ActiveWorkoutSnapshot` the UI reads. Merges replace
//! the stored value atomically and publish a change notification via
//! a watch channel, so readers never observe a half-merged snapshot.

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use crate::protocol::MetricsUpdate;
use crate::session::snapshot::ActiveWorkoutSnapshot;

/// Owns the canonical peer-session snapshot and merges updates.
pub struct SessionReconciler {
    snapshot: Mutex<Option<ActiveWorkoutSnapshot>>,
    changed: watch::Sender<Option<ActiveWorkoutSnapshot>>,
}

impl SessionReconciler {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(None);
        Self {
            snapshot: Mutex::new(None),
            changed,
        }
    }

    /// Current snapshot, if any.
    pub fn snapshot(&self) -> Option<ActiveWorkoutSnapshot> {
        self.snapshot.lock().clone()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.lock().is_some()
    }

    /// Subscribe to snapshot-changed notifications. The receiver sees
    /// each replacement and the `None` published on clear.
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveWorkoutSnapshot>> {
        self.changed.subscribe()
    }

    /// Merge a metric update into the stored snapshot (or create the
    /// first one from it) and publish the result.
    pub fn merge(&self, update: &MetricsUpdate, raw: &Value) -> ActiveWorkoutSnapshot {
        let mut slot = self.snapshot.lock();
        let next = match slot.as_ref() {
            Some(prior) => prior.merged(update, raw),
            None => ActiveWorkoutSnapshot::from_update(update, raw, chrono::Utc::now()),
        };
        *slot = Some(next.clone());
        drop(slot);

        tracing::debug!(
            distance_m = next.distance_meters,
            hr = next.heart_rate_bpm,
            state = ?next.state,
            "merged peer metrics into snapshot"
        );
        self.changed.send_replace(Some(next.clone()));
        next
    }

    /// Replace the snapshot wholesale (detection replies build their
    /// snapshot outside and install it here).
    pub fn install(&self, snapshot: ActiveWorkoutSnapshot) {
        *self.snapshot.lock() = Some(snapshot.clone());
        self.changed.send_replace(Some(snapshot));
    }

    /// Drop the snapshot. Called on join and on an explicit
    /// "no active workout" resolution.
    pub fn clear(&self) {
        *self.snapshot.lock() = None;
        self.changed.send_replace(None);
    }
}

impl Default for SessionReconciler {
    fn default() -> Self {
        Self::new()
    }
}

//! Immutable point-in-time record of the peer-reported workout.
//!
//! Snapshots are replaced wholesale on every merge, never mutated
//! field-by-field, so readers can never observe a partially-updated
//! record. Numeric fields absent from an update inherit the prior
//! snapshot's value — a transient zero-filled message must not blank
//! established metrics.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::protocol::MetricsUpdate;
use crate::session::pace::normalize_pace;

/// Lifecycle of the peer-reported workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkoutState {
    NotStarted,
    Running,
    Paused,
    Completed,
}

impl WorkoutState {
    /// Normalize the peer's state strings. `running`, `active`, and
    /// `inProgress` all collapse to [`WorkoutState::Running`].
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" | "active" | "inProgress" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" | "ended" => Some(Self::Completed),
            "notStarted" => Some(Self::NotStarted),
            _ => None,
        }
    }

    /// States that mean a workout is underway on the peer.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// Immutable snapshot of the peer's in-progress workout.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveWorkoutSnapshot {
    pub is_indoor: bool,
    pub state: WorkoutState,
    pub distance_meters: f64,
    pub elapsed_seconds: f64,
    pub heart_rate_bpm: f64,
    pub calories: f64,
    pub cadence: f64,
    pub pace_sec_per_km: f64,
    pub start_timestamp: DateTime<Utc>,
    /// The payload the snapshot was last built from, kept verbatim for
    /// engine adoption.
    pub raw_payload: serde_json::Map<String, Value>,
}

impl ActiveWorkoutSnapshot {
    /// Build the first snapshot from an update. Absent numerics
    /// default to 0; the start timestamp is taken from the update's
    /// epoch field or computed back from `elapsedTime` when absent.
    pub fn from_update(update: &MetricsUpdate, raw: &Value, now: DateTime<Utc>) -> Self {
        let elapsed = update.elapsed_seconds.unwrap_or(0.0);
        Self {
            is_indoor: update.is_indoor.unwrap_or(false),
            state: update.state.unwrap_or(WorkoutState::Running),
            distance_meters: update.distance_meters.unwrap_or(0.0),
            elapsed_seconds: elapsed,
            heart_rate_bpm: update.heart_rate_bpm.unwrap_or(0.0),
            calories: update.calories.unwrap_or(0.0),
            cadence: update.cadence.unwrap_or(0.0),
            pace_sec_per_km: update.pace_raw.and_then(normalize_pace).unwrap_or(0.0),
            start_timestamp: start_timestamp(update, elapsed, now),
            raw_payload: raw_map(raw),
        }
    }

    /// Merge an update into this snapshot, producing a new one.
    ///
    /// Absent numerics inherit the prior value, and a zero for an
    /// established nonzero metric is treated as a transient and
    /// ignored — the wearable emits zero-filled frames around state
    /// transitions. Pace goes through the normalizer; an indeterminate
    /// unit keeps the previous known-good pace. The start timestamp
    /// survives unless the update carries an authoritative one.
    pub fn merged(&self, update: &MetricsUpdate, raw: &Value) -> Self {
        Self {
            is_indoor: update.is_indoor.unwrap_or(self.is_indoor),
            state: update.state.unwrap_or(self.state),
            distance_meters: merge_metric(self.distance_meters, update.distance_meters),
            elapsed_seconds: merge_metric(self.elapsed_seconds, update.elapsed_seconds),
            heart_rate_bpm: merge_metric(self.heart_rate_bpm, update.heart_rate_bpm),
            calories: merge_metric(self.calories, update.calories),
            cadence: merge_metric(self.cadence, update.cadence),
            pace_sec_per_km: update
                .pace_raw
                .and_then(normalize_pace)
                .unwrap_or(self.pace_sec_per_km),
            start_timestamp: match update.start_epoch {
                Some(epoch) => epoch_to_utc(epoch).unwrap_or(self.start_timestamp),
                None => self.start_timestamp,
            },
            raw_payload: raw_map(raw),
        }
    }
}

/// A positive incoming value replaces the prior one; zero (or a
/// negative glitch) only sticks while the prior value is still zero.
fn merge_metric(prior: f64, incoming: Option<f64>) -> f64 {
    match incoming {
        Some(v) if v > 0.0 => v,
        _ => prior,
    }
}

fn start_timestamp(update: &MetricsUpdate, elapsed: f64, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(ts) = update.start_epoch.and_then(epoch_to_utc) {
        return ts;
    }
    now - chrono::Duration::milliseconds((elapsed * 1000.0) as i64)
}

fn epoch_to_utc(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    Utc.timestamp_millis_opt((epoch * 1000.0) as i64).single()
}

fn raw_map(raw: &Value) -> serde_json::Map<String, Value> {
    raw.as_object().cloned().unwrap_or_default()
}

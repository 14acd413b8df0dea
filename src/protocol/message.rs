//! Peer message parsing, classification, and outbound builders.
//!
//! The wearable speaks loosely-shaped JSON with a `type` tag. All
//! "is this field present / what shape is it" logic lives here: each
//! inbound payload is parsed once into a typed view, and the rest of
//! the crate operates on typed fields only.
//!
//! Some firmware revisions use different keys for the same concept
//! (`startDate` vs `startTime`, `active` vs `hasActiveWorkout`). The
//! resolution order is first-present-wins, in exactly that order.

use serde_json::{json, Value};
use std::time::Instant;

use crate::session::snapshot::WorkoutState;

/// Sync messages carrying continuous live metrics.
pub const TYPE_SYNC_WORKOUT_DATA: &str = "syncWorkoutData";

/// Opaque state-change directives, forwarded verbatim to the engine.
pub const TYPE_OUTDOOR_STATE_CHANGE: &str = "outdoorRunStateChange";
pub const TYPE_INDOOR_STATE_CHANGE: &str = "indoorRunStateChange";

/// Outbound: ask the peer whether a workout is already active.
pub const TYPE_REQUEST_ACTIVE_WORKOUT: &str = "requestActiveRunningWorkout";

/// Outbound: tell the peer the phone has joined its session.
pub const TYPE_JOINED_FROM_PHONE: &str = "joinedWorkoutFromPhone";

// ── Classification ──────────────────────────────────────────────

/// Routing class for an inbound peer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Authoritative state-change directive for the tracking engine.
    Command,
    /// Continuous metric stream (`syncWorkoutData`).
    Sync,
    /// Reply to a detection request (carries an active-workout flag).
    DetectionReply,
    /// Bare acknowledgement (`{status: "received"}`).
    JoinAck,
    /// Unrecognized. Logged and dropped with no side effects.
    Unknown,
}

/// An inbound peer message, owned by the adapter until classified.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub payload: Value,
    pub arrival: Instant,
}

impl InboundMessage {
    /// Classify a raw payload by its `type` tag.
    ///
    /// Untagged payloads are still recognizable when they carry an
    /// active-workout flag (detection replies) or a bare `status`
    /// field (acknowledgements); anything else is `Unknown`.
    pub fn classify(payload: Value) -> Self {
        let kind = match payload.get("type").and_then(Value::as_str) {
            Some(TYPE_SYNC_WORKOUT_DATA) => MessageKind::Sync,
            Some(TYPE_OUTDOOR_STATE_CHANGE) | Some(TYPE_INDOOR_STATE_CHANGE) => {
                MessageKind::Command
            }
            Some(_) => MessageKind::Unknown,
            None => {
                if payload.get("active").is_some() || payload.get("hasActiveWorkout").is_some() {
                    MessageKind::DetectionReply
                } else if payload.get("status").is_some() {
                    MessageKind::JoinAck
                } else {
                    MessageKind::Unknown
                }
            }
        };
        Self {
            kind,
            payload,
            arrival: Instant::now(),
        }
    }
}

// ── Typed metric view ───────────────────────────────────────────

/// Typed view of the metric fields a sync message or detection reply
/// may carry. Every field is optional; absence is meaningful (the
/// reconciler inherits the prior value rather than zeroing).
#[derive(Debug, Clone, Default)]
pub struct MetricsUpdate {
    /// `active` | `hasActiveWorkout`, first present wins.
    pub active: Option<bool>,
    pub state: Option<WorkoutState>,
    pub is_indoor: Option<bool>,
    pub distance_meters: Option<f64>,
    pub elapsed_seconds: Option<f64>,
    pub heart_rate_bpm: Option<f64>,
    pub calories: Option<f64>,
    pub cadence: Option<f64>,
    /// Raw pace, unit unknown until normalized.
    pub pace_raw: Option<f64>,
    /// `startDate` | `startTime` (epoch seconds), first present wins.
    pub start_epoch: Option<f64>,
}

impl MetricsUpdate {
    /// Extract the typed view from a raw payload.
    pub fn parse(payload: &Value) -> Self {
        Self {
            active: flag(payload, "active").or_else(|| flag(payload, "hasActiveWorkout")),
            state: payload
                .get("state")
                .and_then(Value::as_str)
                .and_then(WorkoutState::parse),
            is_indoor: flag(payload, "isIndoor"),
            distance_meters: num(payload, "distance"),
            elapsed_seconds: num(payload, "elapsedTime"),
            heart_rate_bpm: num(payload, "heartRate"),
            calories: num(payload, "calories"),
            cadence: num(payload, "cadence"),
            pace_raw: num(payload, "pace"),
            start_epoch: num(payload, "startDate").or_else(|| num(payload, "startTime")),
        }
    }

    /// Whether any metric field is present at all. A reply without
    /// them is a bare acknowledgement, not a session description.
    pub fn has_metrics(&self) -> bool {
        self.distance_meters.is_some()
            || self.elapsed_seconds.is_some()
            || self.heart_rate_bpm.is_some()
            || self.calories.is_some()
            || self.cadence.is_some()
            || self.pace_raw.is_some()
    }

    /// Whether the carried metrics prove a workout is underway:
    /// any of distance, heart rate, or pace strictly positive.
    pub fn indicates_activity(&self) -> bool {
        self.distance_meters.is_some_and(|v| v > 0.0)
            || self.heart_rate_bpm.is_some_and(|v| v > 0.0)
            || self.pace_raw.is_some_and(|v| v > 0.0)
    }
}

/// Numeric field accessor. Older firmware occasionally stringifies
/// numbers, so numeric strings are accepted too.
fn num(payload: &Value, key: &str) -> Option<f64> {
    match payload.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean field accessor; tolerates 0/1 numerics.
fn flag(payload: &Value, key: &str) -> Option<bool> {
    match payload.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

// ── Outbound builders ───────────────────────────────────────────

/// Detection request: ask the peer whether a workout is active.
pub fn detection_request() -> Value {
    json!({ "type": TYPE_REQUEST_ACTIVE_WORKOUT })
}

/// Acknowledgement sent after a command was forwarded to the engine.
pub fn received_ack() -> Value {
    json!({ "status": "received" })
}

/// Phone-state fields carried by the join notification so the peer
/// can reduce its own update fidelity.
#[derive(Debug, Clone)]
pub struct JoinedNotification {
    pub phone_state: String,
    pub phone_elapsed_seconds: f64,
    pub phone_distance_meters: f64,
    pub has_good_location_data: bool,
    pub is_primary_for_heart_rate: bool,
    pub is_primary_for_distance: bool,
    pub is_primary_for_pace: bool,
}

impl JoinedNotification {
    /// Build the `joinedWorkoutFromPhone` payload.
    pub fn into_payload(self, timestamp_epoch: i64) -> Value {
        json!({
            "type": TYPE_JOINED_FROM_PHONE,
            "status": "joined",
            "timestamp": timestamp_epoch,
            "phoneIsJoining": true,
            "phoneState": self.phone_state,
            "phoneElapsedTime": self.phone_elapsed_seconds,
            "phoneDistance": self.phone_distance_meters,
            "hasGoodLocationData": self.has_good_location_data,
            "isPrimaryForHeartRate": self.is_primary_for_heart_rate,
            "isPrimaryForDistance": self.is_primary_for_distance,
            "isPrimaryForPace": self.is_primary_for_pace,
        })
    }
}

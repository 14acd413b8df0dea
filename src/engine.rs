//! Collaborator seams: tracking engine, presenter, persisted store.
//!
//! The surrounding app wires real implementations in at construction;
//! tests substitute recording fakes. Engine failures are the only
//! peer-sync failures that surface to the interactive layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::session::discipline::Discipline;
use crate::session::snapshot::ActiveWorkoutSnapshot;

/// Metrics handed to the engine when adopting a peer session. The
/// engine starts from these values, not from zero.
#[derive(Debug, Clone)]
pub struct WorkoutAdoption {
    pub is_indoor: bool,
    pub distance_meters: f64,
    pub elapsed_seconds: f64,
    pub heart_rate_bpm: f64,
    pub calories: f64,
    pub cadence: f64,
    pub start_timestamp: DateTime<Utc>,
    /// The peer payload the snapshot was built from, verbatim.
    pub raw_payload: serde_json::Map<String, Value>,
}

impl From<&ActiveWorkoutSnapshot> for WorkoutAdoption {
    fn from(snap: &ActiveWorkoutSnapshot) -> Self {
        Self {
            is_indoor: snap.is_indoor,
            distance_meters: snap.distance_meters,
            elapsed_seconds: snap.elapsed_seconds,
            heart_rate_bpm: snap.heart_rate_bpm,
            calories: snap.calories,
            cadence: snap.cadence,
            start_timestamp: snap.start_timestamp,
            raw_payload: snap.raw_payload.clone(),
        }
    }
}

/// The engine's own run state, reported back to the peer on join.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// State string in the peer protocol's vocabulary
    /// ("notStarted", "running", "paused").
    pub state: String,
    pub elapsed_seconds: f64,
    pub distance_meters: f64,
    /// Whether local GPS fixes are currently good enough to make the
    /// phone the primary source for distance and pace.
    pub has_good_location: bool,
}

/// The local workout tracking engine.
#[async_trait]
pub trait TrackingEngine: Send + Sync {
    /// Adopt a peer-reported session as the local session's starting
    /// state. Errors here are surfaced as rejected operations.
    async fn import_workout(&self, adoption: WorkoutAdoption) -> anyhow::Result<()>;

    /// Execute a state-change directive forwarded verbatim from the
    /// peer. Commands are authoritative; they apply regardless of the
    /// active screen.
    async fn handle_command(&self, payload: Value);

    /// Observe a live metric frame. Called for every sync message the
    /// throttle admits, whether or not a local session is running.
    async fn ingest_peer_metrics(&self, payload: Value);

    /// Current engine status.
    fn status(&self) -> EngineStatus;

    /// Whether a local session is currently being tracked.
    fn is_running(&self) -> bool;

    /// Discipline the engine is currently configured for.
    fn discipline(&self) -> Discipline;

    /// Reconfigure the engine's discipline. May reject (e.g. mid-run).
    fn set_discipline(&self, discipline: Discipline) -> anyhow::Result<()>;
}

/// Selects the presentation flow once a session starts or is joined.
pub trait SessionPresenter: Send + Sync {
    fn present_session(&self, is_indoor: bool);
}

/// Persisted discipline selection (settings store).
pub trait SelectionStore: Send + Sync {
    fn discipline(&self) -> Option<Discipline>;
    fn set_discipline(&self, discipline: Discipline);
}

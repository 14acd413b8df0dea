//! Join handshake: adopt the detected peer session locally and tell
//! the peer the phone has taken over.
//!
//! Local adoption must succeed even when the peer cannot be told
//! immediately — the notification is best-effort context replication,
//! never a failure path. Only engine adoption can fail the join.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::channel::PeerChannel;
use crate::engine::{SessionPresenter, TrackingEngine, WorkoutAdoption};
use crate::error::SyncError;
use crate::protocol::JoinedNotification;
use crate::session::detector::WorkoutDetector;
use crate::session::reconciler::SessionReconciler;

/// Adopts a detected session into the local engine and notifies the
/// peer so it can reduce its update fidelity.
pub struct JoinOrchestrator {
    engine: Arc<dyn TrackingEngine>,
    presenter: Arc<dyn SessionPresenter>,
    channel: Arc<dyn PeerChannel>,
}

impl JoinOrchestrator {
    pub fn new(
        engine: Arc<dyn TrackingEngine>,
        presenter: Arc<dyn SessionPresenter>,
        channel: Arc<dyn PeerChannel>,
    ) -> Self {
        Self {
            engine,
            presenter,
            channel,
        }
    }

    /// Execute the join.
    ///
    /// Fails with [`SyncError::NoActiveSession`] when there is no
    /// snapshot to adopt (logged no-op, no engine mutation) and
    /// [`SyncError::EngineRejected`] when the engine refuses the
    /// adoption — in that case the detected session stands and the
    /// snapshot is kept. On success the snapshot is cleared and the
    /// join state returns to idle.
    pub async fn join(
        &self,
        reconciler: &SessionReconciler,
        detector: &Mutex<WorkoutDetector>,
    ) -> Result<(), SyncError> {
        let snapshot = match reconciler.snapshot() {
            Some(s) => s,
            None => {
                tracing::warn!("join requested with no active peer session");
                return Err(SyncError::NoActiveSession);
            }
        };
        detector.lock().begin_join();

        if let Err(e) = self
            .engine
            .import_workout(WorkoutAdoption::from(&snapshot))
            .await
        {
            tracing::warn!(error = %e, "engine rejected peer-session adoption");
            detector.lock().fail_join();
            return Err(SyncError::EngineRejected(e));
        }
        detector.lock().mark_joined();

        tracing::info!(
            is_indoor = snapshot.is_indoor,
            distance_m = snapshot.distance_meters,
            elapsed_s = snapshot.elapsed_seconds,
            "adopted peer workout into local engine"
        );
        self.presenter.present_session(snapshot.is_indoor);

        // Best-effort: the peer reduces its cadence once it learns the
        // phone is primary. An unreachable link degrades to deferred
        // replication and never fails the join.
        let status = self.engine.status();
        let outdoor_with_fix = !snapshot.is_indoor && status.has_good_location;
        let note = JoinedNotification {
            phone_state: status.state,
            phone_elapsed_seconds: status.elapsed_seconds,
            phone_distance_meters: status.distance_meters,
            has_good_location_data: status.has_good_location,
            // The wearable keeps the heart-rate sensor either way.
            is_primary_for_heart_rate: false,
            is_primary_for_distance: outdoor_with_fix,
            is_primary_for_pace: outdoor_with_fix,
        };
        self.channel
            .send_best_effort(note.into_payload(Utc::now().timestamp()))
            .await;

        reconciler.clear();
        detector.lock().reset();
        Ok(())
    }
}

//! Active-workout detection state machine.
//!
//! One detection round per visibility event: request, wait up to the
//! reply timeout, interpret. Detection polling is gated by
//! [`JoinState`] — it only runs from `Idle`, so it can never race a
//! join in progress. Rounds carry a generation stamp: starting a local
//! workout bumps the generation and any late reply is ignored, since
//! the local session takes precedence.

use serde_json::Value;

use crate::protocol::MetricsUpdate;
use crate::session::reconciler::SessionReconciler;
use crate::session::snapshot::ActiveWorkoutSnapshot;

/// Gate for detection polling and the join handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Idle,
    RequestSent,
    ActiveDetected,
    Joining,
    Joined,
}

/// How a detection reply was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// The reply described an active session; a snapshot was built.
    ActiveDetected,
    /// Bare acknowledgement; the prior sync-derived snapshot stands.
    KeptPriorSnapshot,
    /// No active workout on the peer.
    NoActiveWorkout,
}

/// Runs the request → detect → confirm protocol.
pub struct WorkoutDetector {
    state: JoinState,
    generation: u64,
}

impl WorkoutDetector {
    pub fn new() -> Self {
        Self {
            state: JoinState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    /// Start a detection round. Returns the round's generation stamp,
    /// or `None` when detection is suppressed (any state but `Idle`).
    pub fn begin_round(&mut self) -> Option<u64> {
        if self.state != JoinState::Idle {
            return None;
        }
        self.state = JoinState::RequestSent;
        Some(self.generation)
    }

    /// Whether a reply stamped with `generation` is still current.
    pub fn round_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state == JoinState::RequestSent
    }

    /// Abandon the in-flight round (reply timeout or channel failure).
    /// Resolved as "no active workout"; not retried until the next
    /// visibility event.
    pub fn abandon_round(&mut self) {
        if self.state == JoinState::RequestSent {
            self.state = JoinState::Idle;
        }
    }

    /// Invalidate any pending round. Called when the user starts a
    /// local workout before detection completes.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if matches!(self.state, JoinState::RequestSent | JoinState::ActiveDetected) {
            self.state = JoinState::Idle;
        }
    }

    /// Interpret the peer's detection reply.
    pub fn interpret_reply(
        &mut self,
        update: &MetricsUpdate,
        raw: &Value,
        reconciler: &SessionReconciler,
    ) -> DetectionOutcome {
        // Bare acknowledgement: no active flag, no metric fields. A
        // prior sync-derived snapshot with real distance is proof
        // enough of an active session; do not erase it.
        if update.active.is_none() && !update.has_metrics() {
            if reconciler
                .snapshot()
                .is_some_and(|s| s.distance_meters > 0.0)
            {
                self.state = JoinState::ActiveDetected;
                return DetectionOutcome::KeptPriorSnapshot;
            }
            self.state = JoinState::Idle;
            return DetectionOutcome::NoActiveWorkout;
        }

        if update.active == Some(true) && update.state.is_some_and(|s| s.is_live()) {
            let snapshot = ActiveWorkoutSnapshot::from_update(update, raw, chrono::Utc::now());
            reconciler.install(snapshot);
            self.state = JoinState::ActiveDetected;
            return DetectionOutcome::ActiveDetected;
        }

        // Explicit "no active workout" (or an unusable reply): clear
        // any stale snapshot and stand down.
        reconciler.clear();
        self.state = JoinState::Idle;
        DetectionOutcome::NoActiveWorkout
    }

    /// Implicit detection: a sync message proving activity while no
    /// local session runs counts as a detection event, bypassing the
    /// request/reply round. Returns true when the state advanced.
    pub fn on_implicit_sync(&mut self, update: &MetricsUpdate) -> bool {
        if !update.indicates_activity() {
            return false;
        }
        match self.state {
            JoinState::Idle | JoinState::RequestSent => {
                self.state = JoinState::ActiveDetected;
                true
            }
            _ => false,
        }
    }

    // ── Join gating ─────────────────────────────────────────────

    /// Move into the join handshake. Detection stays suppressed until
    /// the join resolves.
    pub fn begin_join(&mut self) {
        self.state = JoinState::Joining;
    }

    /// Engine adoption succeeded.
    pub fn mark_joined(&mut self) {
        self.state = JoinState::Joined;
    }

    /// Join failed after starting; the detected session still stands.
    pub fn fail_join(&mut self) {
        self.state = JoinState::ActiveDetected;
    }

    /// Return to idle (join complete, or detection result consumed).
    pub fn reset(&mut self) {
        self.state = JoinState::Idle;
    }
}

impl Default for WorkoutDetector {
    fn default() -> Self {
        Self::new()
    }
}

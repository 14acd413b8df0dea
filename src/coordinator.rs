//! Session coordinator — the single serialization point.
//!
//! All inbound peer messages, detection rounds, drain ticks, and local
//! user actions funnel through this coordinator before touching shared
//! state. Inbound delivery rides an mpsc channel consumed by [`run`],
//! so channel adapters may deliver from any task; exactly one logical
//! task mutates the snapshot and selection stores at a time.
//!
//! Dispatch:
//! - commands → tracking engine, unconditionally (authoritative),
//!   acknowledged best-effort
//! - sync → throttle → reconciler merge + engine forward; while no
//!   local session runs the first frame proving activity doubles as an
//!   implicit detection event
//! - detection replies → detector (stale rounds ignored)
//! - unknown → logged, dropped, no side effects
//!
//! [`run`]: SessionCoordinator::run

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::channel::PeerChannel;
use crate::config::SyncConfig;
use crate::engine::{SelectionStore, SessionPresenter, TrackingEngine};
use crate::error::SyncError;
use crate::protocol::{
    detection_request, received_ack, InboundMessage, MessageKind, MetricsUpdate,
};
use crate::session::detector::{JoinState, WorkoutDetector};
use crate::session::discipline::{Discipline, SourceOfTruthResolver};
use crate::session::join::JoinOrchestrator;
use crate::session::reconciler::SessionReconciler;
use crate::session::snapshot::ActiveWorkoutSnapshot;
use crate::session::throttle::{Admission, SyncThrottle};

/// Orchestrates peer-session reconciliation for one companion link.
pub struct SessionCoordinator {
    config: SyncConfig,
    channel: Arc<dyn PeerChannel>,
    engine: Arc<dyn TrackingEngine>,
    reconciler: SessionReconciler,
    throttle: Mutex<SyncThrottle>,
    detector: Mutex<WorkoutDetector>,
    joiner: JoinOrchestrator,
    resolver: SourceOfTruthResolver,
}

impl SessionCoordinator {
    pub fn new(
        config: SyncConfig,
        channel: Arc<dyn PeerChannel>,
        engine: Arc<dyn TrackingEngine>,
        presenter: Arc<dyn SessionPresenter>,
        persisted: Arc<dyn SelectionStore>,
    ) -> Self {
        let throttle = SyncThrottle::new(
            config.throttle_interval,
            config.queue_capacity,
            config.drain_batch,
        );
        Self {
            joiner: JoinOrchestrator::new(engine.clone(), presenter, channel.clone()),
            resolver: SourceOfTruthResolver::new(persisted, engine.clone()),
            config,
            channel,
            engine,
            reconciler: SessionReconciler::new(),
            throttle: Mutex::new(throttle),
            detector: Mutex::new(WorkoutDetector::new()),
        }
    }

    /// Current peer-session snapshot, if one has been established.
    pub fn snapshot(&self) -> Option<ActiveWorkoutSnapshot> {
        self.reconciler.snapshot()
    }

    /// Subscribe to snapshot-changed notifications for the UI layer.
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveWorkoutSnapshot>> {
        self.reconciler.subscribe()
    }

    pub fn join_state(&self) -> JoinState {
        self.detector.lock().state()
    }

    // ── Inbound dispatch ────────────────────────────────────────

    /// Classify and route one inbound peer message.
    pub async fn handle_message(&self, raw: Value) {
        let msg = InboundMessage::classify(raw);
        match msg.kind {
            MessageKind::Command => {
                // Authoritative directive — forwarded verbatim,
                // regardless of the active screen.
                tracing::info!(
                    msg_type = msg.payload.get("type").and_then(serde_json::Value::as_str),
                    "forwarding peer command to engine"
                );
                self.engine.handle_command(msg.payload).await;
                self.channel.send_best_effort(received_ack()).await;
            }
            MessageKind::Sync => self.handle_sync(msg).await,
            MessageKind::DetectionReply => {
                // Only meaningful while a round is in flight; replies
                // normally come back on the request path.
                let update = MetricsUpdate::parse(&msg.payload);
                let mut detector = self.detector.lock();
                if detector.state() == JoinState::RequestSent {
                    detector.interpret_reply(&update, &msg.payload, &self.reconciler);
                } else {
                    tracing::debug!("unsolicited detection reply ignored");
                }
            }
            MessageKind::JoinAck => {
                tracing::debug!("peer acknowledged");
            }
            MessageKind::Unknown => {
                tracing::warn!(
                    msg_type = msg.payload.get("type").and_then(serde_json::Value::as_str),
                    "unknown peer message dropped"
                );
            }
        }
    }

    async fn handle_sync(&self, msg: InboundMessage) {
        let admission = self
            .throttle
            .lock()
            .offer(msg.payload.clone(), msg.arrival);
        match admission {
            Admission::Process => {
                self.route_sync(msg.payload).await;
                // Accepting also kicks a drain cycle so queued frames
                // don't wait for the next timer tick.
                self.drain_tick().await;
            }
            Admission::Queued => {
                tracing::trace!(queued = self.throttle.lock().queued(), "sync frame queued");
            }
        }
    }

    /// Merge one admitted sync frame and forward it to the engine.
    async fn route_sync(&self, payload: Value) {
        let update = MetricsUpdate::parse(&payload);

        if !self.engine.is_running() {
            let mut detector = self.detector.lock();
            if detector.on_implicit_sync(&update) {
                tracing::info!(
                    "sync frame with live metrics treated as implicit detection"
                );
            }
        }

        // Live merge is never suppressed; the UI-facing snapshot keeps
        // tracking the peer whether or not a local session runs.
        self.reconciler.merge(&update, &payload);
        self.engine.ingest_peer_metrics(payload).await;
    }

    /// Release up to one drain batch of queued sync frames. Driven by
    /// [`run`]'s timer and after each accepted frame.
    ///
    /// [`run`]: SessionCoordinator::run
    pub async fn drain_tick(&self) {
        let batch = self.throttle.lock().drain();
        for payload in batch {
            self.route_sync(payload).await;
        }
    }

    // ── Detection ───────────────────────────────────────────────

    /// Run one detection round. Called on each visibility event; a
    /// no-op while a round is in flight or a join is underway. On
    /// timeout the round is abandoned and not auto-retried.
    pub async fn on_view_visible(&self) {
        let Some(generation) = self.detector.lock().begin_round() else {
            tracing::debug!(state = ?self.join_state(), "detection suppressed");
            return;
        };

        tracing::info!("requesting active workout from peer");
        let result = self
            .channel
            .send_with_reply(detection_request(), self.config.detection_timeout)
            .await;

        let mut detector = self.detector.lock();
        if !detector.round_current(generation) {
            // A local workout started while we waited; the local
            // session takes precedence.
            tracing::debug!("detection reply superseded, ignoring");
            return;
        }
        match result {
            Ok(reply) => {
                let update = MetricsUpdate::parse(&reply);
                let outcome = detector.interpret_reply(&update, &reply, &self.reconciler);
                tracing::info!(?outcome, "detection round resolved");
            }
            Err(e) => {
                tracing::warn!(error = %e, "detection round abandoned");
                detector.abandon_round();
            }
        }
    }

    // ── Local actions ───────────────────────────────────────────

    /// Adopt the detected peer session into the local engine.
    pub async fn join(&self) -> Result<(), SyncError> {
        self.joiner.join(&self.reconciler, &self.detector).await
    }

    /// The user is starting a local workout: cancel any pending
    /// detection and reconcile the discipline stores so all three
    /// agree before the session starts.
    pub fn on_local_workout_start(
        &self,
        ui_selection: Option<Discipline>,
    ) -> Result<Discipline, SyncError> {
        self.detector.lock().cancel();
        self.resolver.resolve(ui_selection)
    }

    // ── Run loop ────────────────────────────────────────────────

    /// Drive the coordinator: consume inbound messages and fire the
    /// periodic drain. This is the single writer; adapters deliver
    /// into `inbound` from any task.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<Value>) {
        let mut tick = tokio::time::interval(self.config.throttle_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                maybe = inbound.recv() => match maybe {
                    Some(raw) => self.handle_message(raw).await,
                    None => break,
                },
                _ = tick.tick() => self.drain_tick().await,
            }
        }
        tracing::info!("inbound channel closed, coordinator stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::ScriptedChannel;
    use crate::engine::{EngineStatus, WorkoutAdoption};
    use crate::session::snapshot::WorkoutState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeEngine {
        running: AtomicBool,
        commands: Mutex<Vec<Value>>,
        metric_frames: AtomicUsize,
        imports: AtomicUsize,
        discipline: Mutex<Option<Discipline>>,
    }

    #[async_trait]
    impl TrackingEngine for FakeEngine {
        async fn import_workout(&self, _: WorkoutAdoption) -> anyhow::Result<()> {
            self.imports.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn handle_command(&self, payload: Value) {
            self.commands.lock().push(payload);
        }
        async fn ingest_peer_metrics(&self, _: Value) {
            self.metric_frames.fetch_add(1, Ordering::SeqCst);
        }
        fn status(&self) -> EngineStatus {
            EngineStatus {
                state: "running".into(),
                elapsed_seconds: 100.0,
                distance_meters: 400.0,
                has_good_location: true,
            }
        }
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
        fn discipline(&self) -> Discipline {
            self.discipline.lock().unwrap_or(Discipline::OutdoorRun)
        }
        fn set_discipline(&self, d: Discipline) -> anyhow::Result<()> {
            *self.discipline.lock() = Some(d);
            Ok(())
        }
    }

    struct NullPresenter;
    impl SessionPresenter for NullPresenter {
        fn present_session(&self, _: bool) {}
    }

    struct MemoryStore(Mutex<Option<Discipline>>);
    impl SelectionStore for MemoryStore {
        fn discipline(&self) -> Option<Discipline> {
            *self.0.lock()
        }
        fn set_discipline(&self, d: Discipline) {
            *self.0.lock() = Some(d);
        }
    }

    struct Fixture {
        coordinator: SessionCoordinator,
        engine: Arc<FakeEngine>,
        channel: Arc<ScriptedChannel>,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(FakeEngine::default());
        let channel = Arc::new(ScriptedChannel::new());
        let store = Arc::new(MemoryStore(Mutex::new(None)));
        let coordinator = SessionCoordinator::new(
            SyncConfig::default(),
            channel.clone(),
            engine.clone(),
            Arc::new(NullPresenter),
            store.clone(),
        );
        Fixture {
            coordinator,
            engine,
            channel,
            store,
        }
    }

    #[tokio::test]
    async fn sync_without_session_creates_snapshot() {
        let f = fixture();
        f.coordinator
            .handle_message(json!({
                "type": "syncWorkoutData",
                "distance": 500.0, "heartRate": 140.0, "pace": 300.0, "state": "running"
            }))
            .await;

        let snap = f.coordinator.snapshot().unwrap();
        assert_eq!(snap.pace_sec_per_km, 300.0);
        assert_eq!(snap.state, WorkoutState::Running);
        assert_eq!(f.coordinator.join_state(), JoinState::ActiveDetected);
        assert_eq!(f.engine.metric_frames.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn follow_up_zero_distance_does_not_reset() {
        let f = fixture();
        f.coordinator
            .handle_message(json!({"type": "syncWorkoutData", "distance": 500.0, "heartRate": 140.0}))
            .await;
        // Within the throttle window the second frame is queued; the
        // drain tick releases it through the reconciler.
        f.coordinator
            .handle_message(json!({"type": "syncWorkoutData", "distance": 0.0}))
            .await;
        f.coordinator.drain_tick().await;

        let snap = f.coordinator.snapshot().unwrap();
        assert_eq!(snap.distance_meters, 500.0);
        assert_eq!(snap.heart_rate_bpm, 140.0);
        // Drained frames are still forwarded to the engine
        assert_eq!(f.engine.metric_frames.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn commands_forward_unconditionally_and_ack() {
        let f = fixture();
        f.coordinator
            .handle_message(json!({"type": "outdoorRunStateChange", "command": "pause"}))
            .await;

        let commands = f.engine.commands.lock();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["command"], "pause");
        drop(commands);

        let acks = f.channel.replicated();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0]["status"], "received");
    }

    #[tokio::test]
    async fn unknown_messages_have_no_side_effects() {
        let f = fixture();
        f.coordinator
            .handle_message(json!({"type": "weatherUpdate", "temp": 21}))
            .await;

        assert!(f.coordinator.snapshot().is_none());
        assert!(f.engine.commands.lock().is_empty());
        assert_eq!(f.engine.metric_frames.load(Ordering::SeqCst), 0);
        assert!(f.channel.replicated().is_empty());
    }

    #[tokio::test]
    async fn detection_round_resolves_active() {
        let f = fixture();
        f.channel.push_reply(Ok(json!({
            "active": true, "state": "running",
            "distance": 2100.0, "elapsedTime": 700.0
        })));

        f.coordinator.on_view_visible().await;

        assert_eq!(f.coordinator.join_state(), JoinState::ActiveDetected);
        assert_eq!(f.coordinator.snapshot().unwrap().distance_meters, 2100.0);
        assert_eq!(f.channel.sent()[0]["type"], "requestActiveRunningWorkout");
    }

    #[tokio::test]
    async fn detection_timeout_resolves_idle() {
        let f = fixture();
        // No scripted reply: the channel times out
        f.coordinator.on_view_visible().await;

        assert_eq!(f.coordinator.join_state(), JoinState::Idle);
        assert!(f.coordinator.snapshot().is_none());
        // Not auto-retried — only one request went out
        assert_eq!(f.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn local_start_cancels_detection_and_resolves_discipline() {
        let f = fixture();
        // Detected session exists
        f.coordinator
            .handle_message(json!({"type": "syncWorkoutData", "distance": 900.0}))
            .await;
        assert_eq!(f.coordinator.join_state(), JoinState::ActiveDetected);

        f.store.set_discipline(Discipline::Treadmill);
        let winner = f
            .coordinator
            .on_local_workout_start(Some(Discipline::Hike))
            .unwrap();

        assert_eq!(winner, Discipline::Hike);
        assert_eq!(f.store.discipline(), Some(Discipline::Hike));
        assert_eq!(f.engine.discipline(), Discipline::Hike);
        assert_eq!(f.coordinator.join_state(), JoinState::Idle);
    }

    #[tokio::test]
    async fn join_adopts_and_notifies() {
        let f = fixture();
        f.coordinator
            .handle_message(json!({"type": "syncWorkoutData", "distance": 1500.0, "heartRate": 150.0}))
            .await;

        f.coordinator.join().await.unwrap();

        assert_eq!(f.engine.imports.load(Ordering::SeqCst), 1);
        assert!(f.coordinator.snapshot().is_none());
        assert_eq!(f.coordinator.join_state(), JoinState::Idle);
        let joined: Vec<_> = f
            .channel
            .replicated()
            .into_iter()
            .filter(|m| m["type"] == "joinedWorkoutFromPhone")
            .collect();
        assert_eq!(joined.len(), 1);
    }

    #[tokio::test]
    async fn sync_while_running_merges_without_detection() {
        let f = fixture();
        f.engine.running.store(true, Ordering::SeqCst);

        f.coordinator
            .handle_message(json!({"type": "syncWorkoutData", "distance": 300.0, "heartRate": 120.0}))
            .await;

        // Merged for the UI, forwarded to the engine, but no detection
        assert_eq!(f.coordinator.snapshot().unwrap().distance_meters, 300.0);
        assert_eq!(f.coordinator.join_state(), JoinState::Idle);
        assert_eq!(f.engine.metric_frames.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_loop_processes_inbound_and_drains() {
        let f = fixture();
        let coordinator = Arc::new(f.coordinator);
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(coordinator.clone().run(rx));

        tx.send(json!({"type": "syncWorkoutData", "distance": 250.0}))
            .await
            .unwrap();
        // Second frame lands inside the throttle window and queues;
        // the interval tick drains it.
        tx.send(json!({"type": "syncWorkoutData", "heartRate": 133.0}))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        let snap = coordinator.snapshot().unwrap();
        assert_eq!(snap.distance_meters, 250.0);
        assert_eq!(snap.heart_rate_bpm, 133.0);

        drop(tx);
        handle.await.unwrap();
    }
}

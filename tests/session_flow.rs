//! End-to-end reconciliation flow against the public API: detect an
//! active peer workout, merge a burst of live metrics, then join.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stridelink::channel::PeerChannel;
use stridelink::engine::{
    EngineStatus, SelectionStore, SessionPresenter, TrackingEngine, WorkoutAdoption,
};
use stridelink::{Discipline, JoinState, SessionCoordinator, SyncConfig, SyncError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stridelink=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct FakeChannel {
    replies: Mutex<VecDeque<Value>>,
    replicated: Mutex<Vec<Value>>,
}

#[async_trait]
impl PeerChannel for FakeChannel {
    async fn send_with_reply(
        &self,
        _message: Value,
        timeout: Duration,
    ) -> Result<Value, SyncError> {
        self.replies
            .lock()
            .pop_front()
            .ok_or(SyncError::DetectionTimeout(timeout))
    }

    async fn send_best_effort(&self, message: Value) {
        self.replicated.lock().push(message);
    }
}

#[derive(Default)]
struct FakeEngine {
    running: AtomicBool,
    imports: AtomicUsize,
    adopted: Mutex<Option<WorkoutAdoption>>,
    discipline: Mutex<Option<Discipline>>,
}

#[async_trait]
impl TrackingEngine for FakeEngine {
    async fn import_workout(&self, adoption: WorkoutAdoption) -> anyhow::Result<()> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        *self.adopted.lock() = Some(adoption);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }
    async fn handle_command(&self, _: Value) {}
    async fn ingest_peer_metrics(&self, _: Value) {}
    fn status(&self) -> EngineStatus {
        let adopted = self.adopted.lock();
        EngineStatus {
            state: "running".into(),
            elapsed_seconds: adopted.as_ref().map_or(0.0, |a| a.elapsed_seconds),
            distance_meters: adopted.as_ref().map_or(0.0, |a| a.distance_meters),
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

fn coordinator(channel: Arc<FakeChannel>, engine: Arc<FakeEngine>) -> SessionCoordinator {
    SessionCoordinator::new(
        SyncConfig::default(),
        channel,
        engine,
        Arc::new(NullPresenter),
        Arc::new(MemoryStore(Mutex::new(None))),
    )
}

#[tokio::test]
async fn detect_merge_join_round_trip() {
    init_tracing();
    let channel = Arc::new(FakeChannel::default());
    let engine = Arc::new(FakeEngine::default());
    let coordinator = coordinator(channel.clone(), engine.clone());

    // Peer reports an in-progress outdoor run on the first visibility
    // event.
    channel.replies.lock().push_back(json!({
        "hasActiveWorkout": true,
        "state": "inProgress",
        "isIndoor": false,
        "distance": 1800.0,
        "elapsedTime": 540.0,
        "heartRate": 152.0,
        "pace": 3.0
    }));
    coordinator.on_view_visible().await;

    assert_eq!(coordinator.join_state(), JoinState::ActiveDetected);
    let snap = coordinator.snapshot().unwrap();
    assert_eq!(snap.distance_meters, 1800.0);
    // 3.0 is meters/second — normalized to sec/km
    assert!((snap.pace_sec_per_km - 333.333).abs() < 0.01);

    // A live metric frame refines the snapshot; a zero-filled field
    // must not blank what detection established.
    coordinator
        .handle_message(json!({
            "type": "syncWorkoutData", "distance": 0.0, "heartRate": 155.0
        }))
        .await;
    coordinator.drain_tick().await;
    let snap = coordinator.snapshot().unwrap();
    assert_eq!(snap.distance_meters, 1800.0);
    assert_eq!(snap.heart_rate_bpm, 155.0);

    // Join: engine adopts the peer metrics, peer is notified, the
    // snapshot is consumed.
    coordinator.join().await.unwrap();
    assert_eq!(engine.imports.load(Ordering::SeqCst), 1);
    let adopted = engine.adopted.lock().clone().unwrap();
    assert_eq!(adopted.distance_meters, 1800.0);
    assert!(!adopted.is_indoor);

    assert!(coordinator.snapshot().is_none());
    assert_eq!(coordinator.join_state(), JoinState::Idle);

    let joined = channel.replicated.lock().clone();
    let note = joined
        .iter()
        .find(|m| m["type"] == "joinedWorkoutFromPhone")
        .expect("join notification sent");
    assert_eq!(note["phoneIsJoining"], true);
    assert_eq!(note["phoneDistance"], 1800.0);
}

#[tokio::test]
async fn unreachable_peer_never_blocks_local_flow() {
    init_tracing();
    let channel = Arc::new(FakeChannel::default());
    let engine = Arc::new(FakeEngine::default());
    let coordinator = coordinator(channel.clone(), engine.clone());

    // Detection times out (no reply scripted) — resolved as no active
    // workout, nothing retried.
    coordinator.on_view_visible().await;
    assert_eq!(coordinator.join_state(), JoinState::Idle);

    // The peer's stream later comes alive; implicit detection kicks in
    // without another request round.
    coordinator
        .handle_message(json!({
            "type": "syncWorkoutData", "distance": 320.0, "state": "running"
        }))
        .await;
    assert_eq!(coordinator.join_state(), JoinState::ActiveDetected);

    // Joining still succeeds even though send-with-reply would fail:
    // the notification path is best-effort only.
    coordinator.join().await.unwrap();
    assert_eq!(engine.imports.load(Ordering::SeqCst), 1);
}

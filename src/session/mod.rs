//! Workout-session reconciliation components.
//!
//! - snapshot + reconciler: canonical merged view of the peer session
//! - throttle: rate limiter / batching queue for the sync stream
//! - detector: request → detect → confirm protocol and join gating
//! - join: adoption handshake
//! - discipline: three-source source-of-truth resolution
//! - pace: ambiguous-unit normalization

pub mod detector;
pub mod discipline;
pub mod join;
pub mod pace;
pub mod reconciler;
pub mod snapshot;
pub mod throttle;

pub use detector::{DetectionOutcome, JoinState, WorkoutDetector};
pub use discipline::{Discipline, DisciplineSelection, SourceOfTruthResolver};
pub use join::JoinOrchestrator;
pub use pace::normalize_pace;
pub use reconciler::SessionReconciler;
pub use snapshot::{ActiveWorkoutSnapshot, WorkoutState};
pub use throttle::{Admission, SyncThrottle};

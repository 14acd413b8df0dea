//! stridelink — cross-device workout-session reconciliation.
//!
//! Synchronizes an in-progress exercise session between the primary
//! tracking controller (phone) and a companion wearable peer:
//!
//! - detects whether a workout is already active on the peer
//! - merges the peer's live metrics into a local snapshot under
//!   unreliable, out-of-order, bursty delivery
//! - resolves disagreement among the three discipline-selection
//!   stores (interactive, persisted, engine)
//! - runs the explicit join handshake so the peer can reduce its
//!   update cadence once the phone has taken over
//!
//! The transport, tracking engine, presenter, and settings store are
//! injected seams ([`channel::PeerChannel`], [`engine::TrackingEngine`],
//! [`engine::SessionPresenter`], [`engine::SelectionStore`]); the
//! [`coordinator::SessionCoordinator`] run loop is the single writer
//! over all shared session state.

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod session;

pub use config::SyncConfig;
pub use coordinator::SessionCoordinator;
pub use error::SyncError;
pub use session::{ActiveWorkoutSnapshot, Discipline, JoinState, WorkoutState};

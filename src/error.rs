//! Error taxonomy for peer-session synchronization.
//!
//! Peer-communication failures are absorbed locally — the wearable is
//! optional, so an unreachable link degrades to "no peer data" rather
//! than a user-facing error. Only local engine-adoption failures are
//! surfaced to the interactive layer.

use std::time::Duration;

/// Errors produced while reconciling a workout session with the peer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The peer link is down. Detection and join notifications degrade
    /// to best-effort; never fatal.
    #[error("peer channel unreachable")]
    ChannelUnreachable,

    /// No reply to a detection request within the window. Resolved as
    /// "no active workout"; retried only on the next visibility event.
    #[error("no detection reply within {0:?}")]
    DetectionTimeout(Duration),

    /// `join()` was called with no snapshot to adopt. Logged no-op.
    #[error("no active peer workout to join")]
    NoActiveSession,

    /// Unknown message type or a required field was missing. The
    /// message is dropped; the router never faults on these.
    #[error("malformed peer message: {0}")]
    MalformedMessage(String),

    /// The local tracking engine refused to adopt the peer session
    /// (e.g. invalid discipline). Surfaced as a rejected operation.
    #[error("tracking engine rejected operation")]
    EngineRejected(#[source] anyhow::Error),
}

//! Peer link abstraction.
//!
//! The transport (pairing, reachability, session management) is an
//! injected capability with two delivery modes: send-with-reply,
//! bounded by a timeout and failing when the peer is unreachable, and
//! best-effort context replication, which is durable and non-blocking.
//! Inbound messages are delivered by the adapter into the
//! coordinator's inbound queue — implementations may invoke that from
//! any task; only the coordinator's run loop mutates shared state.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::SyncError;

/// Transport seam to the companion device.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Send a message and await the peer's direct reply.
    ///
    /// Fails with [`SyncError::ChannelUnreachable`] when the link is
    /// down and [`SyncError::DetectionTimeout`] when no reply arrives
    /// within `timeout`.
    async fn send_with_reply(&self, message: Value, timeout: Duration)
        -> Result<Value, SyncError>;

    /// Replicate a message best-effort. Never fails from the caller's
    /// perspective; delivery happens whenever the peer is reachable.
    async fn send_best_effort(&self, message: Value);
}

//! Scripted in-memory peer channel for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

use crate::channel::PeerChannel;
use crate::error::SyncError;

/// A channel whose replies are scripted up front. Records everything
/// sent through it for assertions.
#[derive(Default)]
pub struct ScriptedChannel {
    replies: Mutex<VecDeque<Result<Value, SyncError>>>,
    sent: Mutex<Vec<Value>>,
    replicated: Mutex<Vec<Value>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply for the next `send_with_reply` call.
    pub fn push_reply(&self, reply: Result<Value, SyncError>) {
        self.replies.lock().push_back(reply);
    }

    /// Messages sent via `send_with_reply`, in order.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Messages replicated via `send_best_effort`, in order.
    pub fn replicated(&self) -> Vec<Value> {
        self.replicated.lock().clone()
    }
}

#[async_trait]
impl PeerChannel for ScriptedChannel {
    async fn send_with_reply(
        &self,
        message: Value,
        timeout: Duration,
    ) -> Result<Value, SyncError> {
        self.sent.lock().push(message);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or(Err(SyncError::DetectionTimeout(timeout)))
    }

    async fn send_best_effort(&self, message: Value) {
        self.replicated.lock().push(message);
    }
}

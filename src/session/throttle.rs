//! Rate limiter / batching queue for the sync stream.
//!
//! The wearable emits metric frames well below the 500 ms floor the
//! UI needs. A frame arriving within the floor of the last accepted
//! one is queued (bounded, drop-oldest); a periodic drain releases up
//! to three queued frames per cycle. Queue staleness is bounded to
//! roughly `interval × ceil(depth / batch)`.

use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of offering one sync message to the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Process immediately; the acceptance stamp was updated.
    Process,
    /// Held in the pending queue for a later drain cycle.
    Queued,
}

/// Throttles high-frequency sync messages.
pub struct SyncThrottle {
    min_interval: Duration,
    capacity: usize,
    drain_batch: usize,
    last_accepted: Option<Instant>,
    queue: VecDeque<Value>,
}

impl SyncThrottle {
    pub fn new(min_interval: Duration, capacity: usize, drain_batch: usize) -> Self {
        Self {
            min_interval,
            capacity,
            drain_batch,
            last_accepted: None,
            queue: VecDeque::new(),
        }
    }

    /// Offer a sync payload at time `now`. Accepted when the minimum
    /// interval since the last acceptance has elapsed, otherwise
    /// queued with drop-oldest overflow.
    pub fn offer(&mut self, payload: Value, now: Instant) -> Admission {
        let due = match self.last_accepted {
            Some(last) => now.duration_since(last) > self.min_interval,
            None => true,
        };
        if due {
            self.last_accepted = Some(now);
            return Admission::Process;
        }

        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            tracing::debug!(capacity = self.capacity, "sync queue full, dropped oldest");
        }
        self.queue.push_back(payload);
        Admission::Queued
    }

    /// Release up to the drain batch of queued payloads, oldest first.
    pub fn drain(&mut self) -> Vec<Value> {
        let n = self.drain_batch.min(self.queue.len());
        self.queue.drain(..n).collect()
    }

    /// Number of payloads currently queued.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

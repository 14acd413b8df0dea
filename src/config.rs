//! Tunables for the reconciliation subsystem.
//!
//! Defaults match the cadence the companion emits at: sub-second sync
//! bursts are throttled down to human-perceptible UI update rates.

use serde::Deserialize;
use std::time::Duration;

/// Minimum spacing between two processed sync messages: 500 ms.
const DEFAULT_THROTTLE_MS: u64 = 500;

/// Pending sync queue capacity (drop-oldest beyond this).
const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Maximum queued messages drained per cycle.
const DEFAULT_DRAIN_BATCH: usize = 3;

/// How long a detection request waits for the peer's reply: 3 s.
const DEFAULT_DETECTION_TIMEOUT_SECS: u64 = 3;

/// Configuration for the session coordinator and its throttle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum interval between immediately-processed sync messages.
    #[serde(with = "duration_ms", rename = "throttle_ms")]
    pub throttle_interval: Duration,
    /// Bounded FIFO capacity for queued sync messages.
    pub queue_capacity: usize,
    /// Upper bound on messages drained per throttle cycle.
    pub drain_batch: usize,
    /// Reply timeout for one detection round.
    #[serde(with = "duration_secs", rename = "detection_timeout_secs")]
    pub detection_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            throttle_interval: Duration::from_millis(DEFAULT_THROTTLE_MS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_batch: DEFAULT_DRAIN_BATCH,
            detection_timeout: Duration::from_secs(DEFAULT_DETECTION_TIMEOUT_SECS),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

//! Process-wide ducking channel.
//!
//! Two payload-free signals, `music:pause` and `music:resume`, broadcast
//! to any number of subscribers. Publishing never blocks and never fails:
//! a signal with nobody listening is simply dropped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default broadcast buffer. Signals are tiny and consumers fast; a lagging
/// subscriber only ever loses stale pause/resume pairs.
pub const DEFAULT_BUS_CAPACITY: usize = 16;

/// A ducking signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuckSignal {
    /// Ask background audio to step aside.
    Pause,
    /// Background audio may continue.
    Resume,
}

impl DuckSignal {
    /// Wire name of the signal.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Pause => "music:pause",
            Self::Resume => "music:resume",
        }
    }
}

impl fmt::Display for DuckSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

impl FromStr for DuckSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "music:pause" => Ok(Self::Pause),
            "music:resume" => Ok(Self::Resume),
            other => Err(format!("unknown ducking signal '{other}'")),
        }
    }
}

/// Broadcast bus for [`DuckSignal`]s.
///
/// Cloning shares the same underlying channel.
#[derive(Debug, Clone)]
pub struct DuckingBus {
    tx: broadcast::Sender<DuckSignal>,
}

impl Default for DuckingBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl DuckingBus {
    /// Creates a bus with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Broadcasts `signal`, returning how many subscribers received it.
    pub fn publish(&self, signal: DuckSignal) -> usize {
        let receivers = self.tx.send(signal).unwrap_or(0);
        tracing::debug!(signal = %signal, receivers, "ducking signal published");
        receivers
    }

    /// Registers a new subscriber. Only signals published after this call
    /// are delivered to it.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DuckSignal> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

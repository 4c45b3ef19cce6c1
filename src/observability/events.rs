//! Structured event stream for `holdwarp`.
//!
//! Discrete, typed events emitted while a warp session runs. Events are
//! serialized as newline-delimited JSON (JSONL) and carry a monotonically
//! increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a warp run.
///
/// Each variant is tagged with `"type"` when serialized so consumers can
/// dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A gesture was accepted and a session began charging.
    SessionStarted {
        /// When charging started.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: Uuid,
        /// Project the visitor is on.
        project: String,
        /// Progress charging resumed from (non-zero after a mid-decay restart).
        from_progress: u8,
    },

    /// The gesture ended before commit and the session began to decay.
    ChargeReleased {
        /// When the release was handled.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: Uuid,
        /// Progress at the moment of release.
        progress: u8,
    },

    /// Decay reached zero and the session ended without a warp.
    DecayCompleted {
        /// When progress reached zero.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: Uuid,
    },

    /// Progress reached the threshold; the warp is irreversible.
    WarpCommitted {
        /// When the threshold was reached.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: Uuid,
        /// Target route.
        target: String,
    },

    /// The animation window elapsed and navigation fired.
    Navigated {
        /// When navigation fired.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: Uuid,
        /// Route navigated to.
        target: String,
    },

    /// A ducking signal was broadcast.
    DuckSignalPublished {
        /// When the signal was sent.
        timestamp: DateTime<Utc>,
        /// Event name (`"music:pause"` or `"music:resume"`).
        signal: String,
        /// Number of subscribers that received it.
        receivers: usize,
    },

    /// An audio sink refused to play.
    AudioFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// Sink label (e.g. `"cue"`, `"music"`).
        sink: String,
        /// Failure description.
        error: String,
    },

    /// The destination page played its entry animation.
    ArrivalPlayed {
        /// When the entry animation started.
        timestamp: DateTime<Utc>,
        /// Destination route.
        path: String,
    },

    /// A simulated run finished.
    RunCompleted {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Aggregate results.
        summary: RunSummary,
    },
}

/// Aggregate results of a simulated run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Scenario or script name.
    pub scenario: String,
    /// Sessions started.
    pub sessions: u64,
    /// Commits reached.
    pub commits: u64,
    /// Sessions that decayed back to zero.
    pub cancellations: u64,
    /// Navigations fired.
    pub navigations: u64,
    /// Ducking signals published.
    pub duck_signals: u64,
    /// Route the visitor ended on.
    pub final_location: String,
    /// Run time in milliseconds.
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// writes one JSON line and flushes. Serialization or I/O failures are
/// dropped: observability must never disturb the warp.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn committed() -> Event {
        Event::WarpCommitted {
            timestamp: DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            session_id: Uuid::nil(),
            target: "/project/beta".to_owned(),
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&committed()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "WarpCommitted");
        assert_eq!(parsed["target"], "/project/beta");
    }

    #[test]
    fn emitter_writes_sequenced_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(committed());
        emitter.emit(Event::DuckSignalPublished {
            timestamp: Utc::now(),
            signal: "music:resume".to_owned(),
            receivers: 1,
        });

        assert_eq!(emitter.event_count(), 2);
        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "WarpCommitted");
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["signal"], "music:resume");
        assert!(lines[1].get("event").is_none(), "event must be flattened");
    }

    #[test]
    fn run_completed_nests_summary() {
        let event = Event::RunCompleted {
            timestamp: Utc::now(),
            summary: RunSummary {
                scenario: "full-charge".to_owned(),
                navigations: 1,
                ..RunSummary::default()
            },
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(parsed["summary"]["scenario"], "full-charge");
        assert_eq!(parsed["summary"]["navigations"], 1);
    }
}

//! # Event Log
//!
//! The append-only structured event stream external tooling consumes,
//! distinct from the human-facing `tracing` console output `node::logging`
//! sets up. Exact line format: `[ISO-timestamp] [ROLE:PORT] LEVEL -
//! message`. Implemented as its own small writer (a buffered file behind a
//! `parking_lot::Mutex`, mirroring the teacher's preference for
//! `parking_lot` over `std::sync`) rather than folded into the `tracing`
//! pipeline, so the line format is never at the mercy of a formatter layer.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Which role emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Seed,
    Peer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Seed => write!(f, "SEED"),
            Role::Peer => write!(f, "PEER"),
        }
    }
}

/// Event severity, rendered verbatim into the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Info,
    Warning,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventLevel::Info => write!(f, "INFO"),
            EventLevel::Warning => write!(f, "WARNING"),
        }
    }
}

/// An append-only, line-oriented event log.
///
/// `log()` formats and writes a single line while holding only this
/// struct's own mutex — it never calls out while holding a membership,
/// proposal, or liveness lock, satisfying the "writers MUST NOT hold other
/// locks while writing" requirement by construction: callers pass already-
/// extracted values in, not guarded references.
pub struct EventLog {
    writer: Mutex<BufWriter<File>>,
    role: Role,
    port: u16,
}

impl EventLog {
    /// Opens (creating if needed) the event log file in append mode.
    pub fn open(path: impl AsRef<Path>, role: Role, port: u16) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            role,
            port,
        })
    }

    /// Writes one line: `[ISO-timestamp] [ROLE:PORT] LEVEL - message`.
    pub fn log(&self, level: EventLevel, message: &str) {
        let timestamp = Utc::now().to_rfc3339();
        let line = format!(
            "[{}] [{}:{}] {} - {}\n",
            timestamp, self.role, self.port, level, message
        );
        let mut writer = self.writer.lock();
        if let Err(err) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            // The event log is best-effort observability, not a correctness
            // path; a write failure here must not take the node down.
            eprintln!("event log write failed: {err}");
        }
    }

    pub fn info(&self, message: &str) {
        self.log(EventLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(EventLevel::Warning, message);
    }
}

/// Formats a single event-log line without performing any I/O, for tests
/// and for constructing the line a caller intends to compare against what
/// [`EventLog::log`] wrote.
pub fn format_line(
    timestamp: &str,
    role: Role,
    port: u16,
    level: EventLevel,
    message: &str,
) -> String {
    format!("[{}] [{}:{}] {} - {}", timestamp, role, port, level, message)
}

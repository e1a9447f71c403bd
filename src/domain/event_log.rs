//! Bounded, human-readable per-channel event log.
//!
//! Purely observational: nothing in the channel runtime reads it back.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Default number of entries kept per channel.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Normal lifecycle and message traffic.
    Info,
    /// Degraded but recoverable situations (timeouts, transport errors).
    Warn,
    /// Server-reported application errors.
    Error,
}

/// One timestamped log line.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LogEntry {
    /// Unique id within the channel: `<millis>-<seq>`.
    pub id: String,
    /// Monotonic sequence number within the channel.
    pub seq: u64,
    /// Time the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable text.
    pub text: String,
}

/// Fixed-capacity log; the oldest entry is dropped first.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    seq: u64,
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    /// Creates an empty log holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seq: 0,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Records an entry and returns a copy of it.
    pub fn push(&mut self, level: LogLevel, text: impl Into<String>) -> LogEntry {
        self.seq = self.seq.saturating_add(1);
        let timestamp = Utc::now();
        let entry = LogEntry {
            id: format!("{}-{}", timestamp.timestamp_millis(), self.seq),
            seq: self.seq,
            timestamp,
            level,
            text: text.into(),
        };
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    /// Returns the entries, newest first.
    #[must_use]
    pub fn newest_first(&self) -> Vec<LogEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been logged yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.push(LogLevel::Info, format!("entry {i}"));
        }
        assert_eq!(log.len(), 3);
        let texts: Vec<_> = log.newest_first().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, ["entry 4", "entry 3", "entry 2"]);
    }

    #[test]
    fn ids_are_unique() {
        let mut log = EventLog::default();
        let a = log.push(LogLevel::Info, "a");
        let b = log.push(LogLevel::Warn, "b");
        assert_ne!(a.id, b.id);
        assert_eq!(b.seq, a.seq + 1);
        assert_eq!(log.newest_first().first().map(|e| e.level), Some(LogLevel::Warn));
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut log = EventLog::new(0);
        log.push(LogLevel::Info, "a");
        log.push(LogLevel::Info, "b");
        let texts: Vec<_> = log.newest_first().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, ["b"]);
    }
}

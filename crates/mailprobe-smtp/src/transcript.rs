//! Session transcript.
//!
//! Every line sent, every line received and every piece of commentary about
//! the session is appended here in the order it happened. The transcript is
//! append-only: entries are never edited or removed once pushed.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a transcript entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Command written to the server.
    Sent,
    /// Reply line read from the server.
    Received,
    /// Commentary about connection progress.
    Info,
    /// Failure that ended the session.
    Error,
}

impl Direction {
    /// Returns the display prefix used when rendering a transcript.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Sent => ">>> ",
            Self::Received => "<<< ",
            Self::Error => "ERR ",
            Self::Info => "--- ",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Entry origin.
    pub direction: Direction,
    /// Line text, without the CRLF terminator.
    pub message: String,
    /// When the entry was recorded.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.timestamp.format("%H:%M:%S"),
            self.direction.prefix(),
            self.message
        )
    }
}

/// Ordered, append-only log of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<LogEntry>,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry stamped with the current time.
    ///
    /// Timestamps never go backwards: if the wall clock steps back, the entry
    /// reuses the previous entry's timestamp.
    pub fn push(&mut self, direction: Direction, message: impl Into<String>) {
        let now = Utc::now();
        let timestamp = self
            .entries
            .last()
            .map_or(now, |last| last.timestamp.max(now));
        self.entries.push(LogEntry {
            direction,
            message: message.into(),
            timestamp,
        });
    }

    /// Records a command line written to the server.
    pub fn sent(&mut self, line: impl Into<String>) {
        self.push(Direction::Sent, line);
    }

    /// Records a reply line read from the server.
    pub fn received(&mut self, line: impl Into<String>) {
        self.push(Direction::Received, line);
    }

    /// Records progress commentary.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Direction::Info, message);
    }

    /// Records a failure.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Direction::Error, message);
    }

    /// Returns the recorded entries in order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order() {
        let mut log = Transcript::new();
        log.info("Connecting to mail.test:587...");
        log.received("220 mail.test ESMTP");
        log.sent("EHLO test.local");
        log.error("boom");

        let directions: Vec<_> = log.entries().iter().map(|e| e.direction).collect();
        assert_eq!(
            directions,
            vec![
                Direction::Info,
                Direction::Received,
                Direction::Sent,
                Direction::Error
            ]
        );
        assert_eq!(log.len(), 4);
        assert_eq!(log.last().unwrap().message, "boom");
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut log = Transcript::new();
        for i in 0..100 {
            log.info(format!("entry {i}"));
        }
        assert!(
            log.entries()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[test]
    fn serializes_like_the_web_client_expects() {
        let mut log = Transcript::new();
        log.sent("QUIT");
        let json = serde_json::to_value(&log).unwrap();
        let entry = &json[0];
        assert_eq!(entry["direction"], "sent");
        assert_eq!(entry["message"], "QUIT");
        assert!(entry["timestamp"].is_i64());
    }

    #[test]
    fn display_uses_direction_prefix() {
        let mut log = Transcript::new();
        log.received("250 OK");
        let rendered = log.entries()[0].to_string();
        assert!(rendered.ends_with("<<< 250 OK"));
    }
}

use std::sync::{Arc, Mutex};

use crate::domain::models::{LogLevel, NewLogEntry};

/// Per-handler recorder for analyzer log lines.
///
/// Analyzers log through the sink instead of global I/O; the worker drains
/// the captured entries into the job's service-log stream after the cycle,
/// preserving timestamps and levels.
#[derive(Clone, Default)]
pub struct ServiceLogSink {
    entries: Arc<Mutex<Vec<NewLogEntry>>>,
}

impl ServiceLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NewLogEntry::new(LogLevel::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(NewLogEntry::new(LogLevel::Warn, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NewLogEntry::new(LogLevel::Error, message));
    }

    fn push(&self, entry: NewLogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Take the captured entries, leaving the sink empty
    pub fn drain(&self) -> Vec<NewLogEntry> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_preserves_order_and_levels() {
        let sink = ServiceLogSink::new();
        sink.info("first");
        sink.warn("second");
        sink.error("third");

        let entries = sink.drain();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].level, LogLevel::Warn);
        assert_eq!(entries[2].level, LogLevel::Error);
        assert!(entries[0].timestamp <= entries[2].timestamp);

        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_clones_share_the_buffer() {
        let sink = ServiceLogSink::new();
        let clone = sink.clone();
        clone.info("via clone");
        assert_eq!(sink.drain().len(), 1);
    }
}

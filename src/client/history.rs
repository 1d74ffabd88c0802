//! Bounded message history.
//!
//! A FIFO of received messages with receipt timestamps. Once the capacity
//! (100 by default) is reached the oldest entry is evicted on every append,
//! so memory stays bounded regardless of session length. History is not
//! persisted across process restarts.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::protocol::ServerMessage;

// ============================================================================
// HistoryEntry
// ============================================================================

/// One recorded message plus its receipt timestamp.
///
/// Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// The received message.
    pub message: ServerMessage,

    /// When the message was recorded.
    pub received_at: DateTime<Utc>,
}

// ============================================================================
// HistoryBuffer
// ============================================================================

/// Bounded FIFO of received messages.
///
/// Thread-safe; the dispatcher records into it and consumers read snapshots
/// out of it.
pub struct HistoryBuffer {
    /// Entries, oldest first.
    entries: Mutex<VecDeque<HistoryEntry>>,
    /// Maximum number of retained entries.
    capacity: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(128))),
            capacity,
        }
    }

    /// Records a message with the current timestamp.
    ///
    /// Evicts the oldest entry if the buffer is full.
    pub fn record(&self, message: ServerMessage) {
        let entry = HistoryEntry {
            message,
            received_at: Utc::now(),
        };

        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Returns the most recently recorded message, if any.
    #[must_use]
    pub fn last(&self) -> Option<ServerMessage> {
        self.entries.lock().back().map(|e| e.message.clone())
    }

    /// Returns a snapshot of all entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns the number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the maximum number of retained entries.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops all entries, including the last-message pointer.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::MessageType;

    fn chat(room: u32, n: u64) -> ServerMessage {
        ServerMessage::new(MessageType::Chat, room).with_field("seq", n)
    }

    #[test]
    fn test_record_and_last() {
        let buffer = HistoryBuffer::new(100);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last(), None);

        buffer.record(chat(1, 1));
        buffer.record(chat(1, 2));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.last().and_then(|m| m.get_u64("seq")), Some(2));
    }

    #[test]
    fn test_eviction_keeps_capacity() {
        let buffer = HistoryBuffer::new(100);

        for n in 0..101 {
            buffer.record(chat(1, n));
        }

        assert_eq!(buffer.len(), 100);

        // Oldest entry (seq 0) is gone; seq 1 is now the head.
        let entries = buffer.entries();
        assert_eq!(entries.first().and_then(|e| e.message.get_u64("seq")), Some(1));
        assert_eq!(entries.last().and_then(|e| e.message.get_u64("seq")), Some(100));
    }

    #[test]
    fn test_clear_drops_last() {
        let buffer = HistoryBuffer::new(100);
        buffer.record(chat(1, 1));

        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.last(), None);
        assert!(buffer.entries().is_empty());
    }

    #[test]
    fn test_entries_are_ordered() {
        let buffer = HistoryBuffer::new(10);
        for n in 0..5 {
            buffer.record(chat(2, n));
        }

        let seqs: Vec<_> = buffer
            .entries()
            .iter()
            .filter_map(|e| e.message.get_u64("seq"))
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_timestamps_monotonic_enough() {
        let buffer = HistoryBuffer::new(10);
        buffer.record(chat(1, 1));
        buffer.record(chat(1, 2));

        let entries = buffer.entries();
        assert!(entries[0].received_at <= entries[1].received_at);
    }
}

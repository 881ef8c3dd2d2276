//! Bounded relay buffer for undelivered telemetry
//!
//! When the central endpoint is unreachable the agent parks sealed
//! envelopes here. The buffer is strictly FIFO and strictly bounded:
//! once full, accepting a new envelope evicts the oldest one.

use std::collections::VecDeque;

use tracing::warn;

/// Default number of sealed envelopes an agent retains
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// FIFO queue of sealed envelopes with evict-oldest overflow
#[derive(Debug)]
pub struct RelayBuffer {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RelayBuffer {
    /// Create a buffer holding at most `capacity` envelopes. A zero
    /// capacity would make every push a self-eviction; clamp to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an envelope, evicting and returning the oldest entry if
    /// the buffer is already full.
    pub fn push(&mut self, envelope: String) -> Option<String> {
        let evicted = if self.entries.len() >= self.capacity {
            let dropped = self.entries.pop_front();
            warn!(
                capacity = self.capacity,
                "relay buffer full, dropping oldest envelope"
            );
            dropped
        } else {
            None
        };
        self.entries.push_back(envelope);
        evicted
    }

    /// Oldest buffered envelope, if any
    pub fn peek(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    /// Remove and return the oldest buffered envelope
    pub fn pop(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RelayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

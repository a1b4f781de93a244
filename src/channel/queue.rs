//! Bounded FIFO queue for messages submitted while disconnected

use std::collections::VecDeque;

use serde_json::Value;

/// FIFO buffer for outbound payloads awaiting an open connection.
///
/// The queue is bounded; when full, the oldest pending message is dropped to
/// make room (drop-oldest overflow). This bounds memory during prolonged
/// outages at the cost of losing the stalest messages first.
#[derive(Debug)]
pub(crate) struct OutboundQueue {
    items: VecDeque<Value>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Append a payload, evicting the oldest entry if at capacity.
    ///
    /// Returns the evicted payload, if any.
    pub fn push(&mut self, payload: Value) -> Option<Value> {
        let evicted = if self.items.len() >= self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(payload);
        evicted
    }

    /// Take the oldest pending payload.
    pub fn pop_front(&mut self) -> Option<Value> {
        self.items.pop_front()
    }

    /// Put a payload back at the head after a failed transmit.
    pub fn push_front(&mut self, payload: Value) {
        self.items.push_front(payload);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total messages evicted by the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

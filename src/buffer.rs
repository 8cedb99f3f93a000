// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded ingest queue for bus messages.
//!
//! A purpose-built ring buffer with a fixed capacity and an explicit
//! eviction rule: appending to a full queue drops the oldest unflushed
//! message to make room. Under sustained overload the queue keeps the
//! freshest data and never blocks the producer.

/// A single topic/payload message taken off the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Hierarchical, '/'-delimited routing key.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message from a topic and payload.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// An empty topic together with an empty payload marks "no more data"
    /// while draining a batch.
    pub fn is_end_marker(&self) -> bool {
        self.topic.is_empty() && self.payload.is_empty()
    }
}

/// Fixed-capacity FIFO over messages.
///
/// `append` on a full queue evicts the head (oldest) entry and returns it
/// so the caller can account for the loss. Only the forwarder's control
/// loop touches the queue, so no locking is needed.
pub struct BoundedQueue {
    slots: Vec<Option<Message>>,
    head: usize,
    len: usize,
    evicted: u64,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` messages.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
            evicted: 0,
        }
    }

    /// Append a message at the tail.
    ///
    /// Returns `Some(oldest)` if the queue was full and the oldest message
    /// had to be evicted, `None` otherwise.
    pub fn append(&mut self, msg: Message) -> Option<Message> {
        let dropped = if self.len == self.capacity() {
            let old = self.pop_front();
            self.evicted += 1;
            old
        } else {
            None
        };

        let tail = (self.head + self.len) % self.capacity();
        self.slots[tail] = Some(msg);
        self.len += 1;
        dropped
    }

    /// Remove and return the oldest message, or `None` if the queue is empty.
    pub fn pop_front(&mut self) -> Option<Message> {
        if self.len == 0 {
            return None;
        }
        let msg = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        msg
    }

    /// Current number of queued messages.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of messages dropped by eviction since construction.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

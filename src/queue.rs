//! Bounded FIFO queue with eviction accounting.
//!
//! Every stage boundary in the pipeline uses one of these to decouple
//! producer and consumer timing. A full queue never rejects a push: the
//! oldest entry is evicted, the eviction counter increments, and an optional
//! callback observes the evicted value. Thread safety is the caller's
//! responsibility — each instance sits on exactly one stage boundary with a
//! single producer and a single consumer context.

use crate::error::{DenoiseError, Result};
use std::collections::VecDeque;

type EvictionCallback<T> = Box<dyn FnMut(T) + Send>;

/// Fixed-capacity FIFO that evicts its oldest entry on overflow.
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    evicted: u64,
    on_evict: Option<EvictionCallback<T>>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
            on_evict: None,
        }
    }

    /// Creates a queue that reports each evicted entry to `callback`.
    pub fn with_eviction<F>(capacity: usize, callback: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut queue = Self::new(capacity);
        queue.on_evict = Some(Box::new(callback));
        queue
    }

    /// Returns the fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the queue holds no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Returns the cumulative number of evictions since creation (or the
    /// last [`reset_evictions`](Self::reset_evictions)).
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Zeroes the eviction counter without touching queue contents.
    pub fn reset_evictions(&mut self) {
        self.evicted = 0;
    }

    /// Appends an entry, evicting the oldest one first if the queue is full.
    ///
    /// Returns the new length. A push never fails and never blocks.
    pub fn push(&mut self, item: T) -> usize {
        if self.is_full()
            && let Some(oldest) = self.items.pop_front()
        {
            self.evicted += 1;
            if let Some(callback) = self.on_evict.as_mut() {
                callback(oldest);
            }
        }
        self.items.push_back(item);
        self.items.len()
    }

    /// Removes and returns the oldest entry.
    pub fn pop(&mut self) -> Result<T> {
        self.items.pop_front().ok_or(DenoiseError::QueueEmpty)
    }

    /// Returns a reference to the oldest entry without removing it.
    pub fn peek(&self) -> Result<&T> {
        self.items.front().ok_or(DenoiseError::QueueEmpty)
    }

    /// Drops all entries. Cleared entries are not counted as evictions.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.items.len())
            .field("capacity", &self.capacity)
            .field("evicted", &self.evicted)
            .finish()
    }
}

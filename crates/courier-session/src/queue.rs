//! Bounded FIFO queue with backpressure.
//!
//! - [`push`](BoundedQueue::push) waits while the queue is full and fails
//!   with [`MailboxError::MailboxClosed`] once the queue is closed, including
//!   for pushers already waiting.
//! - [`drain`](BoundedQueue::drain) never waits; an empty queue yields an
//!   empty batch.
//! - Dropping a pending `push` future abandons the wait without consuming a
//!   slot, so a timeout around the call is a clean cancellation.
//!
//! Free slots are semaphore permits. A successful push forgets its permit
//! and a drain of `n` items hands `n` permits back.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::errors::MailboxError;

/// A bounded FIFO buffer shared between many producers and one consumer.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    slots: Semaphore,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue holding at most `capacity` items (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            slots: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Append `item`, waiting for a free slot if the queue is full.
    pub async fn push(&self, item: T) -> Result<(), MailboxError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| MailboxError::MailboxClosed)?;

        let mut items = self.items.lock();
        // close() flips the semaphore under this lock
        if self.slots.is_closed() {
            return Err(MailboxError::MailboxClosed);
        }
        permit.forget();
        items.push_back(item);
        Ok(())
    }

    /// Remove and return up to `max` of the oldest items.
    pub fn drain(&self, max: usize) -> Vec<T> {
        let batch: Vec<T> = {
            let mut items = self.items.lock();
            let n = max.min(items.len());
            items.drain(..n).collect()
        };
        if !batch.is_empty() {
            self.slots.add_permits(batch.len());
        }
        batch
    }

    /// Close the queue, failing current and future pushers. Idempotent.
    ///
    /// Items still queued are dropped.
    pub fn close(&self) {
        let mut items = self.items.lock();
        self.slots.close();
        items.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Fixed-capacity blocking FIFO shared by the producer and consumer threads.
//!
//! Unlike an overwriting ring buffer, [`BoundedQueue`] never drops data on its
//! own: [`push`](BoundedQueue::push) blocks (up to a timeout) while the queue
//! is full and [`pop`](BoundedQueue::pop) blocks (up to a timeout) while it is
//! empty.
//!
//! Every popped item comes wrapped in a [`Ticket`].  Dropping the ticket marks
//! the item complete, so the pending count cannot leak on an early return or
//! a panic inside the consumer.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use sleepy_news::pipeline::BoundedQueue;
//!
//! let queue = BoundedQueue::new(2);
//! queue.push("a".to_string(), Duration::from_millis(10)).unwrap();
//! queue.push("b".to_string(), Duration::from_millis(10)).unwrap();
//! assert!(queue.push("c".to_string(), Duration::from_millis(10)).is_err());
//!
//! let ticket = queue.pop(Duration::from_millis(10)).unwrap();
//! assert_eq!(ticket.as_str(), "a");
//! assert_eq!(queue.pending(), 2);
//! drop(ticket);
//! assert_eq!(queue.pending(), 1);
//! ```

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

// ---------------------------------------------------------------------------
// QueueError
// ---------------------------------------------------------------------------

/// Outcome of a push or pop that could not complete within its timeout.
///
/// Both variants are expected under normal operation and are logged at low
/// severity by the loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue stayed full for the whole timeout.
    #[error("queue stayed full for {0:?}")]
    Full(Duration),

    /// No item arrived within the timeout.
    #[error("no item arrived within {0:?}")]
    Empty(Duration),
}

// ---------------------------------------------------------------------------
// BoundedQueue
// ---------------------------------------------------------------------------

struct Inner<T> {
    items: VecDeque<T>,
    /// Items pushed but not yet marked complete.
    pending: usize,
}

/// A thread-safe bounded FIFO with completion tracking.
///
/// ## Invariants
///
/// * `len() <= capacity()` at every observable instant.
/// * `pending()` counts items that were pushed and whose [`Ticket`] has not
///   been dropped yet (queued + in flight).
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
    all_done: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a new queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue capacity must be > 0");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                pending: 0,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    /// Append `item`, waiting up to `timeout` for free space.
    ///
    /// On success the pending count is incremented.  On timeout the item is
    /// dropped and [`QueueError::Full`] is returned.
    pub fn push(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        while inner.items.len() >= self.capacity {
            let now = Instant::now();
            if now >= deadline {
                return Err(QueueError::Full(timeout));
            }
            inner = self
                .not_full
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        inner.items.push_back(item);
        inner.pending += 1;
        drop(inner);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, waiting up to `timeout` for one to arrive.
    ///
    /// The returned [`Ticket`] must be dropped (or
    /// [`complete`](Ticket::complete)d) once the item has been handled.
    pub fn pop(&self, timeout: Duration) -> Result<Ticket<'_, T>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(Ticket {
                    queue: self,
                    item: Some(item),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(QueueError::Empty(timeout));
            }
            inner = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Block until at least one item is queued or `timeout` elapses.
    ///
    /// Returns `true` when the queue is non-empty.  Does not remove anything.
    pub fn wait_for_items(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .not_empty
            .wait_timeout_while(inner, timeout, |inner| inner.items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        !inner.items.is_empty()
    }

    /// Block until every pushed item has been marked complete, or `timeout`
    /// elapses.  Returns `true` when the queue fully drained.
    pub fn join(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .all_done
            .wait_timeout_while(inner, timeout, |inner| inner.pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        inner.pending == 0
    }

    /// Current number of queued items.
    ///
    /// Best-effort: the value may be stale by the time the caller acts on it.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items pushed but not yet marked complete (queued + in flight).
    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_complete(&self) {
        let mut inner = self.lock();
        debug_assert!(inner.pending > 0, "mark_complete without a pending item");
        inner.pending = inner.pending.saturating_sub(1);
        let drained = inner.pending == 0;
        drop(inner);

        if drained {
            self.all_done.notify_all();
        }
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("BoundedQueue")
            .field("len", &inner.items.len())
            .field("pending", &inner.pending)
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A popped item that still counts as pending.
///
/// Dropping the ticket marks the item complete exactly once, whichever path
/// the consumer took (played, failed, or abandoned on shutdown).
pub struct Ticket<'q, T> {
    queue: &'q BoundedQueue<T>,
    item: Option<T>,
}

impl<T> Ticket<'_, T> {
    /// Mark the item complete now and hand back the payload.
    pub fn complete(mut self) -> T {
        // Drop sees `None` afterwards and does not mark a second time.
        let item = match self.item.take() {
            Some(item) => item,
            None => unreachable!("ticket payload taken twice"),
        };
        self.queue.mark_complete();
        item
    }
}

impl<T> Deref for Ticket<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("ticket payload already taken"),
        }
    }
}

impl<T> Drop for Ticket<'_, T> {
    fn drop(&mut self) {
        if self.item.take().is_some() {
            self.queue.mark_complete();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

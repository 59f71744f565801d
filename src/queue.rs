//! Shared, unbounded work queues
//!
//! A [`Queue`] is a cheap-to-clone handle onto one unbounded MPMC mailbox.
//! Every clone refers to the same storage, so one queue can be handed to
//! many workers, and to workers of nested pools, without any global state.
//!
//! Both operations are non-blocking: [`Queue::push`] always succeeds and
//! [`Queue::try_pop`] reports emptiness immediately instead of waiting for a
//! future push.

use crossbeam::utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for queue traffic
///
/// Each counter sits on its own cache line so that pushing and popping
/// threads do not contend on the same line.
#[derive(Debug, Default)]
pub struct QueueStats {
    pushed: CachePadded<AtomicU64>,
    popped: CachePadded<AtomicU64>,
}

impl QueueStats {
    /// Get the number of items pushed
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Get the number of items popped
    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.pushed.store(0, Ordering::Relaxed);
        self.popped.store(0, Ordering::Relaxed);
    }
}

/// Thread-safe unbounded FIFO shared by reference-counted handles
///
/// Items are popped in push order from the point of view of a single
/// consumer. Across concurrent consumers there is no ordering guarantee,
/// only that each pushed item is popped by exactly one caller.
pub struct Queue<T> {
    // Both ends live in every handle, so the channel can never disconnect.
    tx: flume::Sender<T>,
    rx: flume::Receiver<T>,
    stats: Arc<QueueStats>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("pushed", &self.stats.pushed())
            .field("popped", &self.stats.popped())
            .finish()
    }
}

impl<T> Queue<T> {
    /// Create a new, empty queue
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Append an item. Never blocks.
    pub fn push(&self, item: T) {
        if self.tx.send(item).is_ok() {
            self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Pop the next item, or `None` right away if the queue is empty
    pub fn try_pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => {
                self.stats.popped.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(flume::TryRecvError::Empty) | Err(flume::TryRecvError::Disconnected) => None,
        }
    }

    /// Pop until empty, returning everything in the order it was popped
    ///
    /// Draining an already-empty queue returns an empty vector.
    pub fn drain_all(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.try_pop() {
            items.push(item);
        }
        items
    }

    /// Number of items currently waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue currently holds no items
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Whether two handles refer to the same underlying queue
    pub fn same_queue(&self, other: &Queue<T>) -> bool {
        Arc::ptr_eq(&self.stats, &other.stats)
    }
}

impl<T> Extend<T> for Queue<T> {
    fn extend<It: IntoIterator<Item = T>>(&mut self, iter: It) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<It: IntoIterator<Item = T>>(iter: It) -> Self {
        let mut queue = Queue::new();
        queue.extend(iter);
        queue
    }
}

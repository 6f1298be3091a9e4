//! Bounded producer queue.
//!
//! Producers push without ever waiting; the single batch writer pops. When
//! the queue is full the [`OverflowPolicy`] decides which entry is shed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::config::OverflowPolicy;

use super::diagnostics::LogOutcome;

/// Fixed-capacity FIFO shared by producers and one writer task.
pub struct BoundedLogQueue<E> {
    entries: Mutex<VecDeque<E>>,
    capacity: usize,
    policy: OverflowPolicy,
    notify: Notify,
    closed: AtomicBool,
    queued: AtomicU64,
    dropped: AtomicU64,
}

impl<E> BoundedLogQueue<E> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            policy,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            queued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<E>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues `entry` without blocking.
    ///
    /// Returns [`LogOutcome::QueueFull`] when an entry was shed (the incoming
    /// one under `DropNewest`, the oldest under `DropOldest`) and
    /// [`LogOutcome::ShutDown`] once the queue is closed.
    pub fn push(&self, entry: E) -> LogOutcome {
        if self.closed.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return LogOutcome::ShutDown;
        }

        let outcome = {
            let mut entries = self.lock();
            if entries.len() < self.capacity {
                entries.push_back(entry);
                LogOutcome::Ok
            } else {
                match self.policy {
                    OverflowPolicy::DropNewest => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return LogOutcome::QueueFull;
                    }
                    OverflowPolicy::DropOldest => {
                        entries.pop_front();
                        entries.push_back(entry);
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        LogOutcome::QueueFull
                    }
                }
            }
        };

        self.queued.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        outcome
    }

    /// Removes the oldest entry, if any.
    pub fn try_pop(&self) -> Option<E> {
        self.lock().pop_front()
    }

    /// Waits until an entry may be available.
    ///
    /// A push that happens before this is awaited still wakes it, so the
    /// consumer can check `try_pop` and then wait without losing a wakeup.
    pub async fn wait_for_entry(&self) {
        self.notify.notified().await;
    }

    /// Wakes a waiting consumer without pushing, e.g. on shutdown.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Rejects all further pushes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries accepted into the queue since creation.
    pub fn queued_count(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Entries shed by overflow or rejected after close.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn drain(queue: &BoundedLogQueue<u32>) -> Vec<u32> {
        std::iter::from_fn(|| queue.try_pop()).collect()
    }

    #[test]
    fn test_fifo_without_loss_below_capacity() {
        let queue = BoundedLogQueue::new(10, OverflowPolicy::DropNewest);
        for i in 0..10 {
            assert_eq!(queue.push(i), LogOutcome::Ok);
        }
        assert_eq!(queue.len(), 10);
        assert_eq!(drain(&queue), (0..10).collect::<Vec<_>>());
        assert_eq!(queue.dropped_count(), 0);
        assert_eq!(queue.queued_count(), 10);
    }

    #[test]
    fn test_drop_newest_on_overflow() {
        let queue = BoundedLogQueue::new(5, OverflowPolicy::DropNewest);
        let outcomes: Vec<_> = (0..8).map(|i| queue.push(i)).collect();

        assert_eq!(queue.dropped_count(), 3);
        assert_eq!(queue.len(), 5);
        assert_eq!(
            outcomes.iter().filter(|o| **o == LogOutcome::QueueFull).count(),
            3
        );
        assert_eq!(drain(&queue), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_drop_oldest_on_overflow() {
        let queue = BoundedLogQueue::new(5, OverflowPolicy::DropOldest);
        for i in 0..8 {
            queue.push(i);
        }
        assert_eq!(queue.dropped_count(), 3);
        assert_eq!(queue.len(), 5);
        assert_eq!(drain(&queue), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let queue = BoundedLogQueue::new(5, OverflowPolicy::DropNewest);
        queue.push(1);
        queue.close();
        assert_eq!(queue.push(2), LogOutcome::ShutDown);
        assert_eq!(queue.dropped_count(), 1);
        // Already queued entries remain available for draining
        assert_eq!(drain(&queue), vec![1]);
    }

    #[tokio::test]
    async fn test_push_wakes_waiting_consumer() {
        let queue = Arc::new(BoundedLogQueue::new(4, OverflowPolicy::DropNewest));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                loop {
                    if let Some(v) = queue.try_pop() {
                        return v;
                    }
                    queue.wait_for_entry().await;
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(42);

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke up")
            .expect("consumer task");
        assert_eq!(got, 42);
    }

    #[test]
    fn test_concurrent_producers_respect_capacity() {
        let queue = Arc::new(BoundedLogQueue::new(100, OverflowPolicy::DropNewest));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("producer thread");
        }

        assert_eq!(queue.len(), 100);
        assert_eq!(queue.dropped_count(), 100);
        assert_eq!(queue.queued_count(), 100);
    }
}

//! Bounded work queue with completion tracking.
//!
//! Producers block while the queue is full. Every item taken with
//! [`WorkQueue::get`] must be acknowledged with [`WorkQueue::task_done`];
//! [`WorkQueue::join`] resolves once every item put has been acknowledged.

use std::fmt;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::warn;

pub struct WorkQueue<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    /// Items put but not yet acknowledged.
    unfinished: watch::Sender<usize>,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (unfinished, _) = watch::channel(0);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            unfinished,
        }
    }

    /// Enqueue an item, waiting while the queue is full.
    pub async fn put(&self, item: T) -> Result<(), QueueClosed> {
        self.unfinished.send_modify(|n| *n += 1);
        if self.sender.send(item).await.is_err() {
            self.unfinished.send_modify(|n| *n -= 1);
            return Err(QueueClosed);
        }
        Ok(())
    }

    /// Take the next item, waiting while the queue is empty.
    ///
    /// Consumers are served one at a time in arrival order.
    pub async fn get(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Acknowledge one item taken with `get`.
    pub fn task_done(&self) {
        self.unfinished.send_modify(|n| match n.checked_sub(1) {
            Some(left) => *n = left,
            None => warn!("task_done called more times than items were queued"),
        });
    }

    /// Wait until every item put has been acknowledged.
    pub async fn join(&self) {
        let mut unfinished = self.unfinished.subscribe();
        // The sender lives in `self`, so the wait cannot fail.
        let _ = unfinished.wait_for(|n| *n == 0).await;
    }

    /// Items currently buffered in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Items put but not yet acknowledged.
    #[cfg(test)]
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }
}

/// The receiving side of the queue is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work queue closed")
    }
}

impl std::error::Error for QueueClosed {}

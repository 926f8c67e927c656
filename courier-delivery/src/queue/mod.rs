//! Retry queue management

pub mod record;

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

pub use record::RetryRecord;

/// FIFO of records awaiting another delivery attempt.
///
/// Any number of callers may enqueue concurrently; a single worker consumes from the
/// head. Enqueueing never waits on the consumer, and wakes it if it is parked in
/// [`RetryQueue::wait`].
#[derive(Debug, Default)]
pub struct RetryQueue {
    records: Mutex<VecDeque<RetryRecord>>,
    notify: Notify,
}

impl RetryQueue {
    /// Create a new empty retry queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the tail. `None` is ignored.
    pub fn enqueue(&self, record: impl Into<Option<RetryRecord>>) {
        let Some(record) = record.into() else {
            return;
        };

        self.records.lock().push_back(record);
        self.notify.notify_one();
    }

    /// A copy of the head record, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<RetryRecord> {
        self.records.lock().front().cloned()
    }

    /// Remove and return the head, but only if its retry budget is spent.
    pub fn dequeue_if_exhausted(&self) -> Option<RetryRecord> {
        let mut records = self.records.lock();
        if records.front().is_some_and(RetryRecord::is_exhausted) {
            records.pop_front()
        } else {
            None
        }
    }

    /// Number of records waiting (for observation)
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copies of every queued record, head first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RetryRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Resolves once the queue holds at least one record.
    pub async fn wait(&self) {
        loop {
            if !self.is_empty() {
                return;
            }

            // notify_one leaves a permit behind when nobody is waiting, so an enqueue
            // racing with the check above still wakes us
            self.notify.notified().await;
        }
    }

    /// Move the head out for processing. Only the worker calls this.
    pub(crate) fn take_head(&self) -> Option<RetryRecord> {
        self.records.lock().pop_front()
    }

    /// Hand a record taken with [`RetryQueue::take_head`] back to the head.
    pub(crate) fn restore_head(&self, record: RetryRecord) {
        self.records.lock().push_front(record);
    }
}

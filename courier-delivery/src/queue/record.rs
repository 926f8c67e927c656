//! Per-message retry state.

use std::time::Duration;

use courier_common::Message;

/// Retry lifecycle of one message.
///
/// Created when a message first fails with resilience enabled, then owned by the
/// [`RetryQueue`](super::RetryQueue) and mutated only by the worker processing it. The
/// retry budget can only go down; a record whose budget is zero is terminal.
#[derive(Debug, Clone)]
pub struct RetryRecord {
    message: Message,
    retries_remaining: u16,
    retry_delay: Duration,
    last_error: Option<String>,
    first_failure: bool,
}

impl RetryRecord {
    /// New record for a message that has not been handed to the queue yet.
    #[must_use]
    pub const fn new(message: Message, retries: u16, retry_delay: Duration) -> Self {
        Self {
            message,
            retries_remaining: retries,
            retry_delay,
            last_error: None,
            first_failure: true,
        }
    }

    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    #[must_use]
    pub const fn retries_remaining(&self) -> u16 {
        self.retries_remaining
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Detail of the most recent failed attempt.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `true` until the record is first placed under resilience management.
    #[must_use]
    pub const fn is_first_failure(&self) -> bool {
        self.first_failure
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.retries_remaining == 0
    }

    /// Flip the record into resilience mode. Called once, as it is enqueued.
    pub(crate) const fn mark_enqueued(&mut self) {
        self.first_failure = false;
    }

    /// Spend one retry from the budget before an attempt.
    pub(crate) const fn consume_retry(&mut self) {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
    }

    /// Zero the budget so the record is removed on this pass.
    pub(crate) const fn mark_delivered(&mut self) {
        self.retries_remaining = 0;
    }

    /// Overwrite the last error with the detail of the attempt that just failed.
    pub(crate) fn record_failure(&mut self, detail: impl Into<String>) {
        self.last_error = Some(detail.into());
    }
}

//! Background retry worker
//!
//! A single task per resilient sender drains the [`RetryQueue`]. Each pass takes the
//! head record out of the queue, spends one retry on a delivery attempt and then either
//! drops the record (delivered, or budget spent) or hands it back to the head. The
//! record's delay is taken after every attempt, so retries are strictly serialised:
//! the head is retried until it leaves the queue before anything behind it is touched.
//!
//! ```text
//!            attempt ok
//!  Queued ──────────────────────> Delivered
//!    │ ^
//!    │ │ attempt failed, budget left
//!    │ └─────┘
//!    │
//!    │ attempt failed, budget spent
//!    └──────────────────────────> Exhausted
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use courier_common::{
    Signal, internal, outgoing,
    tracing::{debug, error, info},
};
use tokio::{
    sync::broadcast,
    task::{JoinError, JoinHandle},
};

use crate::{
    error::SystemError,
    queue::RetryQueue,
    transport::{self, Transport},
};

/// What a single pass over the queue did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStep {
    /// The queue was empty.
    Idle,
    /// The head had no budget left and was removed without an attempt.
    Discarded,
    /// The attempt succeeded and the record was removed.
    Delivered { delay: Duration },
    /// The attempt failed; the record stays at the head.
    Retrying { remaining: u16, delay: Duration },
    /// The attempt failed and used the last retry; the record was removed.
    Exhausted { last_error: String, delay: Duration },
}

impl WorkerStep {
    /// Pause owed before the next pass.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        match self {
            Self::Idle | Self::Discarded => Duration::ZERO,
            Self::Delivered { delay }
            | Self::Retrying { delay, .. }
            | Self::Exhausted { delay, .. } => *delay,
        }
    }

    /// Whether this pass made a delivery attempt.
    #[must_use]
    pub const fn attempted(&self) -> bool {
        matches!(
            self,
            Self::Delivered { .. } | Self::Retrying { .. } | Self::Exhausted { .. }
        )
    }
}

/// Counters describing what the worker has done so far.
#[derive(Debug, Default)]
pub struct WorkerStats {
    attempts: AtomicU64,
    delivered: AtomicU64,
    exhausted: AtomicU64,
    discarded: AtomicU64,
}

impl WorkerStats {
    /// Delivery attempts made by the worker.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Records delivered on a retry.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Records whose retry budget ran out without a successful attempt.
    pub fn exhausted(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }

    /// Records removed without an attempt because they arrived with no budget.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    fn record(&self, step: &WorkerStep) {
        if step.attempted() {
            self.attempts.fetch_add(1, Ordering::Relaxed);
        }

        let counter = match step {
            WorkerStep::Idle | WorkerStep::Retrying { .. } => return,
            WorkerStep::Discarded => &self.discarded,
            WorkerStep::Delivered { .. } => &self.delivered,
            WorkerStep::Exhausted { .. } => &self.exhausted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The single consumer of a [`RetryQueue`].
#[derive(Debug)]
pub struct ResilienceWorker {
    queue: Arc<RetryQueue>,
    transport: Arc<dyn Transport>,
    stats: Arc<WorkerStats>,
}

impl ResilienceWorker {
    #[must_use]
    pub fn new(queue: Arc<RetryQueue>, transport: Arc<dyn Transport>) -> Self {
        Self {
            queue,
            transport,
            stats: Arc::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Run one pass over the head of the queue.
    ///
    /// Does not wait for work and does not take the record's delay; [`ResilienceWorker::run`]
    /// does both.
    pub async fn process_head(&self) -> WorkerStep {
        let step = self.process_head_inner().await;
        self.stats.record(&step);
        step
    }

    async fn process_head_inner(&self) -> WorkerStep {
        if let Some(record) = self.queue.dequeue_if_exhausted() {
            debug!(
                recipients = %record.message().recipients(),
                "Discarding retry record with no budget left"
            );
            return WorkerStep::Discarded;
        }

        let Some(mut record) = self.queue.take_head() else {
            return WorkerStep::Idle;
        };

        record.consume_retry();
        outgoing!(
            level = INFO,
            "Trying to send message to {} ({} retries left after this one)...",
            record.message().recipients(),
            record.retries_remaining()
        );

        let outcome = transport::attempt(&*self.transport, record.message()).await;
        let delay = record.retry_delay();

        if outcome.is_success() {
            record.mark_delivered();
            info!(
                recipients = %record.message().recipients(),
                "Message delivered successfully"
            );
            return WorkerStep::Delivered { delay };
        }

        record.record_failure(outcome.detail());

        if record.is_exhausted() {
            let last_error = record.last_error().unwrap_or_default().to_string();
            error!(
                recipients = %record.message().recipients(),
                error = %last_error,
                "Error sending message, retries exhausted"
            );
            return WorkerStep::Exhausted { last_error, delay };
        }

        let remaining = record.retries_remaining();
        debug!(
            recipients = %record.message().recipients(),
            error = %outcome.detail(),
            remaining,
            "Retry failed, keeping message at the head of the queue"
        );
        self.queue.restore_head(record);

        WorkerStep::Retrying { remaining, delay }
    }

    /// Drain the queue until a shutdown signal arrives or the signal sender is dropped.
    ///
    /// Parks while the queue is empty. A shutdown that arrives mid-attempt lets the
    /// attempt finish (and the record be put back or dropped) before returning.
    pub async fn run(self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(level = INFO, "Monitoring resilience queue ...");

        loop {
            tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    Self::log_shutdown(signal);
                    break;
                }
                () = self.queue.wait() => {}
            }

            let delay = self.process_head().await.delay();
            if delay.is_zero() {
                continue;
            }

            tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    Self::log_shutdown(signal);
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        internal!(
            level = INFO,
            "Resilience worker stopped with {} record(s) still queued",
            self.queue.len()
        );
    }

    fn log_shutdown(signal: Result<Signal, broadcast::error::RecvError>) {
        match signal {
            Ok(signal) => internal!("Resilience worker received {signal:?}"),
            Err(broadcast::error::RecvError::Closed) => {
                internal!("Resilience worker owner dropped");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                internal!("Resilience worker missed {n} signal(s), stopping");
            }
        }
    }

    ///
    /// Spawn the worker loop onto the current tokio runtime
    ///
    /// # Errors
    /// If called outside of a tokio runtime
    ///
    pub fn start(self) -> Result<WorkerHandle, SystemError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SystemError::NoRuntime)?;
        let (signal, shutdown) = broadcast::channel(1);
        let task = runtime.spawn(self.run(shutdown));

        Ok(WorkerHandle {
            signal,
            task: Some(task),
        })
    }
}

/// Owner's handle on a running worker. Dropping it stops the worker.
#[derive(Debug)]
pub struct WorkerHandle {
    signal: broadcast::Sender<Signal>,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Ask the worker to stop without waiting for it.
    pub fn stop(&self) {
        // No receiver means the worker is already gone
        let _ = self.signal.send(Signal::Shutdown);
    }

    ///
    /// Ask the worker to stop and wait for it to do so
    ///
    /// # Errors
    /// If the worker task panicked
    ///
    pub async fn shutdown(mut self) -> Result<(), JoinError> {
        self.stop();

        match self.task.take() {
            Some(task) => task.await,
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.stop();
        }
    }
}

//! Entry point for sending: one synchronous attempt, then hand-off to the retry worker.

use std::sync::Arc;

use courier_common::{
    CourierConfig, Message, ResilienceConfig, SendOutcome, internal,
    tracing::{error, info, instrument, warn},
};
use tokio::task::JoinError;

use crate::{
    error::{ConfigurationError, DeliveryError},
    queue::{RetryQueue, RetryRecord},
    transport::{self, Transport},
    worker::{ResilienceWorker, WorkerHandle, WorkerStats},
};

#[derive(Debug)]
struct Resilience {
    config: ResilienceConfig,
    queue: Arc<RetryQueue>,
    stats: Arc<WorkerStats>,
    worker: WorkerHandle,
}

/// Sends messages through a [`Transport`], optionally retrying failures in the background.
///
/// Whether resilience is on is decided at construction. With it off, [`send`] is a single
/// attempt. With it on, a failed first attempt is queued for the worker owned by this
/// coordinator and the caller gets the failure straight away; the eventual result of the
/// retries is only visible in the logs.
///
/// [`send`]: DeliveryCoordinator::send
#[derive(Debug)]
pub struct DeliveryCoordinator {
    transport: Arc<dyn Transport>,
    resilience: Option<Resilience>,
}

impl DeliveryCoordinator {
    /// A coordinator without resilience: every send is exactly one attempt.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            resilience: None,
        }
    }

    ///
    /// A coordinator using `config`. When resilience is enabled this starts the retry
    /// worker, which lives until the coordinator is shut down or dropped.
    ///
    /// # Errors
    /// If resilience is enabled and no tokio runtime is available to run the worker
    ///
    pub fn with_resilience(
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Result<Self, DeliveryError> {
        if !config.enabled {
            return Ok(Self::new(transport));
        }

        let queue = Arc::new(RetryQueue::new());
        let worker = ResilienceWorker::new(Arc::clone(&queue), Arc::clone(&transport));
        let stats = worker.stats();
        let worker = worker.start()?;

        internal!(
            level = INFO,
            "Resilience enabled with {} retries and {}ms between attempts",
            config.retries,
            config.retry_delay_ms
        );

        Ok(Self {
            transport,
            resilience: Some(Resilience {
                config,
                queue,
                stats,
                worker,
            }),
        })
    }

    ///
    /// A coordinator configured from a loaded [`CourierConfig`]
    ///
    /// # Errors
    /// See [`DeliveryCoordinator::with_resilience`]
    ///
    pub fn from_config(
        transport: Arc<dyn Transport>,
        config: &CourierConfig,
    ) -> Result<Self, DeliveryError> {
        Self::with_resilience(transport, config.resilience)
    }

    #[must_use]
    pub const fn is_resilient(&self) -> bool {
        self.resilience.is_some()
    }

    /// The retry queue, when resilience is enabled.
    #[must_use]
    pub fn queue(&self) -> Option<&RetryQueue> {
        self.resilience.as_ref().map(|r| &*r.queue)
    }

    /// Counters for the retry worker, when resilience is enabled.
    #[must_use]
    pub fn stats(&self) -> Option<&WorkerStats> {
        self.resilience.as_ref().map(|r| &*r.stats)
    }

    ///
    /// Attempt delivery once, queueing a failed first attempt for retry when resilience
    /// is enabled
    ///
    /// Transport failures are reported through the returned [`SendOutcome`], never as an
    /// error. The caller does not wait for any retries. If the retry worker is no longer
    /// running, a failed attempt is logged and left at that.
    ///
    /// # Errors
    /// [`ConfigurationError::AttachmentsWithResilience`] if resilience is enabled and the
    /// message has attachments; nothing is attempted or queued
    ///
    #[instrument(level = "trace", skip_all, fields(recipients = %message.recipients()))]
    pub async fn try_send(&self, message: Message) -> Result<SendOutcome, DeliveryError> {
        let Some(resilience) = &self.resilience else {
            return Ok(transport::attempt(&*self.transport, &message).await);
        };

        if message.has_attachments() {
            return Err(ConfigurationError::AttachmentsWithResilience.into());
        }

        let outcome = transport::attempt(&*self.transport, &message).await;
        if outcome.is_success() {
            info!(
                recipients = %message.recipients(),
                "Message delivered successfully"
            );
            return Ok(outcome);
        }

        if !resilience.worker.is_running() {
            error!(
                recipients = %message.recipients(),
                error = %outcome.detail(),
                "Resilience worker has stopped, message could not be handed to the retry queue"
            );
            return Ok(outcome);
        }

        let mut record = RetryRecord::new(
            message,
            resilience.config.retries,
            resilience.config.retry_delay(),
        );
        record.record_failure(outcome.detail());

        if record.is_first_failure() {
            warn!(
                recipients = %record.message().recipients(),
                error = %outcome.detail(),
                "Problem sending message"
            );
            internal!(
                level = INFO,
                "Sending message for {} to resilience queue ...",
                record.message().recipients()
            );

            record.mark_enqueued();
            resilience.queue.enqueue(record);
        }

        Ok(outcome)
    }

    /// Like [`DeliveryCoordinator::try_send`], with errors folded into a failed outcome.
    pub async fn send(&self, message: Message) -> SendOutcome {
        self.try_send(message)
            .await
            .unwrap_or_else(|error| SendOutcome::failed(error.to_string()))
    }

    ///
    /// Stop the retry worker, waiting for an attempt in progress to finish. Records still
    /// queued are dropped.
    ///
    /// # Errors
    /// If the worker task panicked
    ///
    pub async fn shutdown(self) -> Result<(), JoinError> {
        match self.resilience {
            Some(resilience) => resilience.worker.shutdown().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{error::TransportError, test_support::CapturedLogs, transport::MemoryTransport};

    fn message() -> Message {
        Message::builder()
            .from("postmaster@example.com")
            .to("user@example.com")
            .subject("Hello")
            .body("Hi there")
            .build()
    }

    #[tokio::test]
    async fn test_plain_send_single_attempt() {
        let transport = MemoryTransport::new();
        let coordinator = DeliveryCoordinator::new(Arc::new(transport.clone()));

        let outcome = coordinator.send(message()).await;
        assert!(outcome.is_success());
        assert_eq!(transport.attempts(), 1);
        assert!(!coordinator.is_resilient());
        assert!(coordinator.queue().is_none());
    }

    #[tokio::test]
    async fn test_plain_send_failure_is_not_retried() {
        let transport = MemoryTransport::new();
        transport.fail_next(1, TransportError::ConnectionFailed("refused".to_string()));
        let coordinator = DeliveryCoordinator::new(Arc::new(transport.clone()));

        let outcome = coordinator.send(message()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.detail(), "Connection failed: refused");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_plain_send_allows_attachments() {
        let transport = MemoryTransport::new();
        let coordinator = DeliveryCoordinator::new(Arc::new(transport.clone()));

        let message = Message::builder()
            .to("user@example.com")
            .attachment("a.txt", "text/plain", b"hi".as_slice())
            .build();
        assert!(coordinator.send(message).await.is_success());
    }

    #[tokio::test]
    async fn test_disabled_config_builds_plain_coordinator() {
        let coordinator = DeliveryCoordinator::with_resilience(
            Arc::new(MemoryTransport::new()),
            ResilienceConfig::default(),
        )
        .expect("no worker needed");
        assert!(!coordinator.is_resilient());
    }

    #[tokio::test]
    async fn test_first_failure_enqueues_one_record() {
        let transport = MemoryTransport::new();
        transport.fail_always(TransportError::Timeout("connect".to_string()));
        let coordinator = DeliveryCoordinator::with_resilience(
            Arc::new(transport.clone()),
            ResilienceConfig::enabled(4, Duration::from_secs(60)),
        )
        .expect("runtime available");

        let outcome = coordinator.send(message()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.detail(), "Timed out: connect");

        // Single-threaded runtime: the worker has not had a chance to run yet
        let queue = coordinator.queue().expect("resilient");
        assert_eq!(queue.len(), 1);
        let record = queue.peek().expect("queued record");
        assert_eq!(record.retries_remaining(), 4);
        assert!(!record.is_first_failure());
        assert_eq!(record.last_error(), Some("Timed out: connect"));
        assert_eq!(record.retry_delay(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_success_queues_nothing() {
        let transport = MemoryTransport::new();
        let coordinator = DeliveryCoordinator::with_resilience(
            Arc::new(transport.clone()),
            ResilienceConfig::enabled(3, Duration::ZERO),
        )
        .expect("runtime available");

        assert!(coordinator.send(message()).await.is_success());
        assert!(coordinator.queue().expect("resilient").is_empty());
    }

    #[tokio::test]
    async fn test_direct_delivery_is_logged() {
        let logs = CapturedLogs::new();
        let _guard = logs.install();

        let coordinator = DeliveryCoordinator::with_resilience(
            Arc::new(MemoryTransport::new()),
            ResilienceConfig::enabled(3, Duration::ZERO),
        )
        .expect("runtime available");

        assert!(coordinator.send(message()).await.is_success());

        let output = logs.contents();
        assert!(output.contains("Message delivered successfully"), "{output}");
        assert!(output.contains("user@example.com"), "{output}");
    }

    #[tokio::test]
    async fn test_attachments_rejected_in_resilience_mode() {
        let transport = MemoryTransport::new();
        let coordinator = DeliveryCoordinator::with_resilience(
            Arc::new(transport.clone()),
            ResilienceConfig::enabled(3, Duration::ZERO),
        )
        .expect("runtime available");

        let message = Message::builder()
            .to("user@example.com")
            .attachment("invoice.pdf", "application/pdf", b"%PDF".as_slice())
            .build();

        let err = coordinator
            .try_send(message.clone())
            .await
            .expect_err("attachments rejected");
        assert!(err.is_configuration());

        let outcome = coordinator.send(message).await;
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.detail(),
            "Configuration error: Use of mail attachments within resilience mode is not permitted"
        );

        assert_eq!(transport.attempts(), 0);
        assert!(coordinator.queue().expect("resilient").is_empty());
    }

    #[tokio::test]
    async fn test_send_after_worker_stopped_still_attempts() {
        let logs = CapturedLogs::new();
        let _guard = logs.install();

        let transport = MemoryTransport::new();
        transport.fail_next(1, TransportError::ConnectionFailed("refused".to_string()));
        let coordinator = DeliveryCoordinator::with_resilience(
            Arc::new(transport.clone()),
            ResilienceConfig::enabled(1, Duration::ZERO),
        )
        .expect("runtime available");

        // Stop the worker but keep the coordinator
        let resilience = coordinator.resilience.as_ref().expect("resilient");
        resilience.worker.stop();
        tokio::time::timeout(Duration::from_secs(1), async {
            while resilience.worker.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("worker stopped");

        let outcome = coordinator
            .try_send(message())
            .await
            .expect("transport failures are not errors");
        assert!(!outcome.is_success());
        assert_eq!(outcome.detail(), "Connection failed: refused");
        assert_eq!(transport.attempts(), 1);
        assert!(coordinator.queue().expect("resilient").is_empty());
        assert!(
            logs.contents()
                .contains("could not be handed to the retry queue")
        );

        // The transport has recovered, so the next send goes through as usual
        assert!(coordinator.send(message()).await.is_success());
        assert_eq!(transport.delivered_count(), 1);
    }

    #[test]
    fn test_resilience_needs_runtime() {
        let err = DeliveryCoordinator::with_resilience(
            Arc::new(MemoryTransport::new()),
            ResilienceConfig::enabled(1, Duration::ZERO),
        )
        .expect_err("no runtime");
        assert!(err.is_system());
    }
}

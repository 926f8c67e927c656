//! The seam between the sender and whatever actually moves bytes.

pub mod memory;

use std::{any::Any, fmt::Debug, panic::AssertUnwindSafe};

use async_trait::async_trait;
use courier_common::{Message, SendOutcome, tracing::debug};
use futures_util::FutureExt;

use crate::error::TransportError;

pub use memory::MemoryTransport;

/// Something capable of delivering a composed [`Message`].
///
/// The same transport is shared by callers and the retry worker, so implementations
/// must tolerate concurrent calls, and must be safe to call more than once with the
/// same message.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    ///
    /// Attempt delivery of `message`
    ///
    /// # Errors
    /// Any failure to hand the message over (network, authentication, protocol)
    ///
    async fn deliver(&self, message: &Message) -> Result<(), TransportError>;
}

/// Make one delivery attempt, converting every failure into a [`SendOutcome`].
///
/// A transport that panics is treated like one that returned an error.
pub async fn attempt(transport: &dyn Transport, message: &Message) -> SendOutcome {
    match AssertUnwindSafe(transport.deliver(message))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => SendOutcome::delivered(),
        Ok(Err(error)) => {
            debug!(
                recipients = %message.recipients(),
                error = %error,
                kind = error.kind(),
                "Delivery attempt failed"
            );
            SendOutcome::failed(error.to_string())
        }
        Err(panic) => SendOutcome::failed(TransportError::Other(panic_message(&*panic)).to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "transport panicked".to_string(),
            |msg| format!("transport panicked: {msg}"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CapturedLogs;

    #[derive(Debug)]
    struct Panicking;

    #[async_trait]
    impl Transport for Panicking {
        async fn deliver(&self, _message: &Message) -> Result<(), TransportError> {
            panic!("socket on fire")
        }
    }

    #[tokio::test]
    async fn test_attempt_success() {
        let transport = MemoryTransport::new();
        let outcome = attempt(&transport, &Message::default()).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.detail(), "OK");
    }

    #[tokio::test]
    async fn test_attempt_failure_uses_error_text() {
        let transport = MemoryTransport::new();
        transport.fail_next(1, TransportError::ConnectionFailed("refused".to_string()));

        let outcome = attempt(&transport, &Message::default()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.detail(), "Connection failed: refused");
    }

    #[tokio::test]
    async fn test_attempt_failure_logs_kind() {
        let logs = CapturedLogs::new();
        let _guard = logs.install();

        let transport = MemoryTransport::new();
        transport.fail_next(
            1,
            TransportError::Rejected {
                code: 550,
                message: "User not found".to_string(),
            },
        );
        let message = Message::builder().to("nobody@example.com").build();
        assert!(!attempt(&transport, &message).await.is_success());

        let output = logs.contents();
        assert!(output.contains("Delivery attempt failed"), "{output}");
        assert!(output.contains("kind=\"permanent\""), "{output}");
        assert!(output.contains("nobody@example.com"), "{output}");
    }

    #[tokio::test]
    async fn test_attempt_captures_panics() {
        let outcome = attempt(&Panicking, &Message::default()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.detail(), "transport panicked: socket on fire");
    }
}

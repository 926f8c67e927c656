//! Typed error handling for delivery operations.
//!
//! - Transport failures are converted to a failed [`SendOutcome`] and never escape a send
//! - Configuration errors are returned to the caller before any attempt is made
//! - System errors cover the sender's own machinery
//!
//! [`SendOutcome`]: courier_common::SendOutcome

use thiserror::Error;

/// Top-level delivery error type.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request combines options that cannot be used together.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// System-level error in the sender itself.
    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Failures raised by a [`Transport`](crate::Transport) while attempting delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to establish a connection to the mail server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The attempt did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The server refused the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server answered with an error status.
    #[error("Rejected: {code} {message}")]
    Rejected { code: u16, message: String },

    /// Anything else, including a transport that panicked mid-attempt.
    #[error("{0}")]
    Other(String),
}

/// Requests the sender refuses before attempting delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Attachments cannot be carried through the retry path.
    #[error("Use of mail attachments within resilience mode is not permitted")]
    AttachmentsWithResilience,
}

/// Errors in the sender's own machinery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SystemError {
    /// The resilience worker must be spawned from inside a tokio runtime.
    #[error("Resilience worker requires a running tokio runtime")]
    NoRuntime,
}

impl TransportError {
    /// Returns `true` if a later attempt may succeed.
    ///
    /// Connection problems, timeouts and 4xx rejections are temporary.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout(_) => true,
            Self::Rejected { code, .. } => (400..500).contains(code),
            Self::Authentication(_) | Self::Other(_) => false,
        }
    }

    /// Returns `true` for 5xx rejections and authentication failures.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Authentication(_) => true,
            Self::Rejected { code, .. } => (500..600).contains(code),
            Self::ConnectionFailed(_) | Self::Timeout(_) | Self::Other(_) => false,
        }
    }

    /// Short label for logs: `temporary`, `permanent` or `unclassified`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        if self.is_temporary() {
            "temporary"
        } else if self.is_permanent() {
            "permanent"
        } else {
            "unclassified"
        }
    }
}

impl DeliveryError {
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

//! Shared building blocks for the courier mail sender.
//!
//! - [`Message`]: the composed message handed to a transport
//! - [`SendOutcome`]: the result of a single delivery attempt
//! - [`config`]: resilience settings and configuration loading
//! - [`logging`]: tracing subscriber setup and the logging macros

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod outcome;

pub use config::{CourierConfig, ResilienceConfig};
pub use error::ConfigError;
pub use message::{Attachment, Message, MessageBuilder};
pub use outcome::SendOutcome;
pub use tracing;

/// Lifecycle signal sent from an owner to its background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}

//! Resilient delivery for outbound mail
//!
//! This crate provides:
//! - A [`Transport`] seam for whatever actually hands messages over
//! - A [`DeliveryCoordinator`] that makes one attempt per send on the caller's task
//! - A [`RetryQueue`] and [`ResilienceWorker`] that retry failed first attempts in the
//!   background with a bounded budget and a fixed pause between attempts

mod coordinator;
pub mod error;
pub mod queue;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod test_support;

// Re-export common types
pub use courier_common::{Message, ResilienceConfig, SendOutcome};
// Re-export core types
pub use coordinator::DeliveryCoordinator;
// Re-export error types
pub use error::{ConfigurationError, DeliveryError, SystemError, TransportError};
pub use queue::{RetryQueue, RetryRecord};
pub use transport::{MemoryTransport, Transport};
pub use worker::{ResilienceWorker, WorkerHandle, WorkerStats, WorkerStep};

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use courier_common::{Message, tracing};
use parking_lot::Mutex;

use crate::{error::TransportError, transport::Transport};

#[derive(Debug, Default)]
struct State {
    attempts: usize,
    delivered: Vec<Message>,
    scripted_failures: VecDeque<TransportError>,
    outage: Option<TransportError>,
}

/// In-memory transport
///
/// Records every message it accepts and can be told to fail upcoming attempts. It is
/// primarily intended for testing the retry path without a mail server. Clones share
/// the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` attempts with `error`, then go back to accepting messages.
    pub fn fail_next(&self, count: usize, error: TransportError) {
        self.state
            .lock()
            .scripted_failures
            .extend(std::iter::repeat_n(error, count));
    }

    /// Fail the upcoming attempts with each of `errors` in turn.
    pub fn fail_with(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.state.lock().scripted_failures.extend(errors);
    }

    /// Fail every attempt with `error` until [`MemoryTransport::recover`] is called.
    pub fn fail_always(&self, error: TransportError) {
        self.state.lock().outage = Some(error);
    }

    /// End an outage and drop any scripted failures.
    pub fn recover(&self) {
        let mut state = self.state.lock();
        state.outage = None;
        state.scripted_failures.clear();
    }

    /// Number of delivery attempts made, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    #[must_use]
    pub fn delivered(&self) -> Vec<Message> {
        self.state.lock().delivered.clone()
    }

    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.state.lock().delivered.len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn deliver(&self, message: &Message) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.attempts += 1;

        if let Some(error) = state.outage.clone() {
            return Err(error);
        }

        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }

        tracing::trace!(recipients = %message.recipients(), "Memory transport accepted message");
        state.delivered.push(message.clone());
        Ok(())
    }
}

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Result of a single delivery attempt.
///
/// Produced for every attempt, whether made by the caller or by the retry worker, and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    success: bool,
    detail: String,
}

impl SendOutcome {
    /// Detail reported for a successful attempt.
    pub const OK: &'static str = "OK";

    #[must_use]
    pub fn delivered() -> Self {
        Self {
            success: true,
            detail: Self::OK.to_string(),
        }
    }

    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// `"OK"` on success, otherwise the error reported by the attempt.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Display for SendOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "delivered ({})", self.detail)
        } else {
            write!(f, "failed: {}", self.detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivered_outcome() {
        let outcome = SendOutcome::delivered();
        assert!(outcome.is_success());
        assert_eq!(outcome.detail(), "OK");
        assert_eq!(outcome.to_string(), "delivered (OK)");
    }

    #[test]
    fn test_failed_outcome_keeps_detail() {
        let outcome = SendOutcome::failed("Connection failed: refused");
        assert!(!outcome.is_success());
        assert_eq!(outcome.detail(), "Connection failed: refused");
        assert_eq!(outcome.to_string(), "failed: Connection failed: refused");
    }
}

//! HTTP error shape and the retryable status-code set (§6, §7).

use serde::{Deserialize, Serialize};

/// Status codes a worker or client should retry on, per §6.
pub const RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504, 525];

pub fn is_retryable_status(code: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&code)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_spec_retryable_set() {
        for code in [408, 429, 500, 502, 503, 504, 525] {
            assert!(is_retryable_status(code));
        }
    }

    #[test]
    fn rejects_non_retryable_codes() {
        for code in [200, 201, 204, 400, 401, 404] {
            assert!(!is_retryable_status(code));
        }
    }
}

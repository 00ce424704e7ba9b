//! Shared wire contract between the control plane, worker, and client. No
//! database or transport dependency — just the request/response shapes and the
//! opaque-bytes codec wrapper.

pub mod bytes;
pub mod error;
pub mod wire;

pub use bytes::PackedBytes;
pub use error::{is_retryable_status, ErrorResponse, RETRYABLE_STATUS_CODES};
pub use wire::*;

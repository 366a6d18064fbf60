//! API interaction support shared by the LLM-backed summarizer.
//!
//! - [`retry`]: transient error detection (408, 429, 5xx, network timeouts)
//!   with exponential backoff. Never retries 400/401 errors.

pub mod retry;

pub use retry::{RetryConfig, retry_api_call};

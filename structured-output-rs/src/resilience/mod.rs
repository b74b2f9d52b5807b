//! Retry policy for the structured-output loop
//!
//! Attempts are bounded and separated by a fixed pause. Both numbers are
//! configuration, not constants baked into the loop.

mod retry;

pub use retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
pub(crate) use retry::pause;

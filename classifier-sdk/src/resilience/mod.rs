//! Resilience patterns for classifier calls
//!
//! Only bounded exponential-backoff retry is provided. The policy is a
//! standalone value so the same client can run with or without it.

mod retry;

pub use retry::RetryPolicy;

//! Bounded retry for AI completion calls.
//!
//! [`classifier`] decides whether a failure is worth retrying at all;
//! [`scheduler`] drives a fixed delay schedule around any single async
//! operation, reporting each retry to an observer so the UI can show
//! per-attempt feedback.

pub mod classifier;
pub mod scheduler;

pub use classifier::is_retryable;
pub use scheduler::{
    run_with_retry, NoopObserver, RetryError, RetryNotice, RetryObserver, RetrySchedule,
};

//! # Offline Mutation Handling
//!
//! Everything a user does while disconnected is recorded as a queued
//! mutation. This module owns the queue semantics and the retry policy the
//! sync engine applies when draining it.
//!
//! ## Key Components
//!
//! - `queue.rs`: the durable FIFO mutation queue
//! - `retry.rs`: retry budget and backoff strategies

pub mod queue;
pub mod retry;

// Re-export main types
pub use queue::{MutationQueue, RetryStats};
pub use retry::{BackoffStrategy, RetryPolicy};

//! Policy abstractions for dispatch operations.
//!
//! - [`RetryPolicy`]: attempts per provider and the backoff between them
//! - [`DispatchPipeline`]: admission check followed by provider fallback

pub mod pipeline;
pub mod retry;

pub use pipeline::{DeliveryOutcome, DispatchPipeline, RateLimitResult};
pub use retry::{AttemptOutcome, RetryPolicy};

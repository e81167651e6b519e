//! Reliable outbound dispatch through interchangeable providers
//!
//! This crate provides:
//! - Idempotent dispatch keyed on message id
//! - A global sliding-window rate limiter
//! - Per-provider retries with linear backoff
//! - Fallback across providers in priority order
//! - A queryable record of each message's latest outcome

mod config;
mod engine;
mod error;
mod idempotency;
pub mod policy;
pub mod provider;
mod rate_limiter;
mod status;

pub use config::DispatchConfig;
pub use emissary_common::{Message, MessageId};
pub use engine::DispatchEngine;
pub use error::{ConfigError, ProviderError};
pub use idempotency::{Claim, ClaimGuard, IdempotencyStore};
pub use policy::RetryPolicy;
pub use provider::{MockProvider, MockProviderConfig, Provider, Providers, ScriptedProvider};
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use status::{DispatchStatus, StatusRegistry};
pub use tokio_util::sync::CancellationToken;

//! Dispatch pipeline orchestration
//!
//! Coordinates the stages a single message goes through once it has been
//! claimed for dispatch.
//!
//! ## Pipeline Stages
//!
//! 1. **Rate Limiting**: Check the global sliding window
//! 2. **Delivery**: Run the retry loop against each provider in priority order,
//!    stopping at the first success
//!
//! Recording the outcome is left to the caller.

use std::{sync::Arc, time::Duration};

use emissary_common::{Message, MessageId, internal};
use tracing::{info, warn};

use crate::{
    policy::{AttemptOutcome, RetryPolicy},
    provider::Provider,
    rate_limiter::RateLimiter,
};

/// Result of the rate limiting stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Dispatch admitted and counted against the window
    Allowed,
    /// Window is full; a slot frees up after `wait_time`
    RateLimited { wait_time: Duration },
}

/// Result of the delivery stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered by `provider`; `attempts` counts calls across all providers
    Sent { provider: String, attempts: u32 },
    /// Every provider exhausted its attempts
    AllFailed { attempts: u32 },
}

/// Orchestrator for dispatch pipeline stages
pub struct DispatchPipeline<'a> {
    providers: &'a [Arc<dyn Provider>],
    retry_policy: &'a RetryPolicy,
    rate_limiter: &'a RateLimiter,
}

impl<'a> DispatchPipeline<'a> {
    #[must_use]
    pub const fn new(
        providers: &'a [Arc<dyn Provider>],
        retry_policy: &'a RetryPolicy,
        rate_limiter: &'a RateLimiter,
    ) -> Self {
        Self {
            providers,
            retry_policy,
            rate_limiter,
        }
    }

    /// Stage 1: Check the rate limit
    ///
    /// An `Allowed` result has already consumed a slot in the window.
    pub fn check_rate_limit(&self, message_id: &MessageId) -> RateLimitResult {
        if self.rate_limiter.try_admit() {
            return RateLimitResult::Allowed;
        }

        let wait_time = self.rate_limiter.time_until_available();
        info!(
            message_id = %message_id,
            wait_ms = u64::try_from(wait_time.as_millis()).unwrap_or(u64::MAX),
            "[RateLimiter] Too many emails. Try again later."
        );

        RateLimitResult::RateLimited { wait_time }
    }

    /// Stage 2: Deliver through the providers in priority order
    ///
    /// A provider is only left behind once its retry loop is exhausted.
    pub async fn deliver(&self, message: &Message) -> DeliveryOutcome {
        let mut total_attempts = 0;

        for provider in self.providers {
            match self.retry_policy.attempt(provider.as_ref(), message).await {
                AttemptOutcome::Delivered { attempts } => {
                    total_attempts += attempts;
                    info!(
                        message_id = %message.id(),
                        provider = provider.name(),
                        attempts = total_attempts,
                        "[Success] Email sent via {}",
                        provider.name()
                    );

                    return DeliveryOutcome::Sent {
                        provider: provider.name().to_string(),
                        attempts: total_attempts,
                    };
                }
                AttemptOutcome::Exhausted { attempts, .. } => {
                    total_attempts += attempts;
                    warn!(
                        message_id = %message.id(),
                        provider = provider.name(),
                        "[Fallback] {} failed. Trying next provider.",
                        provider.name()
                    );
                }
            }
        }

        internal!(
            level = ERROR,
            "[Failure] All providers failed for email {}",
            message.id()
        );

        DeliveryOutcome::AllFailed {
            attempts: total_attempts,
        }
    }
}

//! Retry policy for a single provider.
//!
//! A provider gets up to `max_attempts` calls per dispatch. Between a failed
//! attempt `k` and attempt `k + 1` the dispatch waits `base_delay * k`
//! (linear backoff). There is no wait before the first attempt and none
//! after the last one.

use std::time::Duration;

use emissary_common::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{ConfigError, ProviderError},
    provider::Provider,
};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum calls to one provider before falling back to the next.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for linear backoff (in milliseconds).
    ///
    /// The wait after failed attempt `k` is `base * k`.
    ///
    /// Default: 500 milliseconds
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
        }
    }
}

/// Result of running the attempt loop against one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The provider accepted the message on attempt number `attempts`
    Delivered { attempts: u32 },
    /// Every attempt failed
    Exhausted {
        attempts: u32,
        last_error: Option<ProviderError>,
    },
}

impl AttemptOutcome {
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Wait between failed attempt `attempt` (1-indexed) and the next one.
    #[must_use]
    pub const fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(attempt as u64))
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    #[must_use]
    pub const fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Returns `0` once the maximum has been reached.
    #[must_use]
    pub const fn remaining_attempts(&self, attempts_made: u32) -> u32 {
        self.max_attempts.saturating_sub(attempts_made)
    }

    /// Whether attempt number `attempt` (1-indexed) is the last one allowed.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] if `max_attempts` is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "retry.max_attempts",
            });
        }

        Ok(())
    }

    /// Call `provider` until it succeeds or the attempts run out.
    ///
    /// Backoff waits suspend only the calling task.
    pub async fn attempt(&self, provider: &dyn Provider, message: &Message) -> AttemptOutcome {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match provider.send(message).await {
                Ok(()) => return AttemptOutcome::Delivered { attempts: attempt },
                Err(error) => {
                    if self.is_final_attempt(attempt) {
                        warn!(
                            message_id = %message.id(),
                            provider = provider.name(),
                            attempt,
                            %error,
                            "[Retry {attempt}] {} failed. No attempts left",
                            provider.name()
                        );
                        last_error = Some(error);
                        break;
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        message_id = %message.id(),
                        provider = provider.name(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "[Retry {attempt}] {} failed. Retrying...",
                        provider.name()
                    );
                    last_error = Some(error);

                    tokio::time::sleep(delay).await;
                    debug!(
                        message_id = %message.id(),
                        provider = provider.name(),
                        next_attempt = attempt + 1,
                        "Backoff elapsed"
                    );
                }
            }
        }

        AttemptOutcome::Exhausted {
            attempts: self.max_attempts,
            last_error,
        }
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        500
    }
}

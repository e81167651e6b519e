//! Static configuration for a dispatch engine

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, policy::RetryPolicy, rate_limiter::RateLimitConfig};

/// Everything a [`DispatchEngine`](crate::DispatchEngine) needs besides its providers
///
/// ```ron
/// (
///     rate_limit: (max_admissions: 5, window_ms: 10000),
///     retry: (max_attempts: 3, base_delay_ms: 500),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Global admission quota
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-provider attempts and backoff
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl DispatchConfig {
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.retry.validate()
    }
}

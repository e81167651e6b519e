//! Global admission control using a sliding window
//!
//! Every admitted dispatch leaves a timestamp behind. A new dispatch is
//! admitted only while fewer than `max_admissions` timestamps fall inside the
//! trailing `window`.
//!
//! # Sliding Window
//!
//! - Timestamps older than the window are pruned on every check
//! - A timestamp exactly `window` old counts as expired
//! - A rejected check records nothing
//!
//! # Example
//!
//! ```text
//! Limit: 2 per 1000ms
//! t=0ms    admit   [0]
//! t=10ms   admit   [0, 10]
//! t=20ms   reject  [0, 10]
//! t=1000ms admit   [10, 1000]   (0 expired at exactly 1000ms)
//! ```

use std::{collections::VecDeque, time::Duration};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ConfigError;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admissions within one window
    #[serde(default = "default_max_admissions")]
    pub max_admissions: u32,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_admissions: default_max_admissions(),
            window_ms: default_window_ms(),
        }
    }
}

const fn default_max_admissions() -> u32 {
    5
}

const fn default_window_ms() -> u64 {
    10_000
}

impl RateLimitConfig {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] if either the quota or the window is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_admissions == 0 {
            return Err(ConfigError::Zero {
                field: "rate_limit.max_admissions",
            });
        }

        if self.window_ms == 0 {
            return Err(ConfigError::Zero {
                field: "rate_limit.window_ms",
            });
        }

        Ok(())
    }
}

/// Sliding-window rate limiter shared by every dispatch of an engine
#[derive(Debug)]
pub struct RateLimiter {
    max_admissions: usize,
    window: Duration,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_admissions: config.max_admissions as usize,
            window: config.window(),
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    /// Drop every timestamp that has left the window as of `now`
    fn prune(&self, admissions: &mut VecDeque<Instant>, now: Instant) {
        while admissions
            .front()
            .is_some_and(|admitted| now.saturating_duration_since(*admitted) >= self.window)
        {
            admissions.pop_front();
        }
    }

    /// Try to admit one dispatch now.
    ///
    /// Returns `true` and records the admission if the window has room,
    /// `false` otherwise.
    pub fn try_admit(&self) -> bool {
        let now = Instant::now();
        let mut admissions = self.admissions.lock();
        self.prune(&mut admissions, now);

        if admissions.len() >= self.max_admissions {
            let in_window = admissions.len();
            drop(admissions);
            tracing::debug!(
                in_window,
                max_admissions = self.max_admissions,
                "Rate limit exceeded"
            );
            return false;
        }

        admissions.push_back(now);
        true
    }

    /// Time until the oldest admission leaves the window, or zero if there is room now
    pub fn time_until_available(&self) -> Duration {
        let now = Instant::now();
        let mut admissions = self.admissions.lock();
        self.prune(&mut admissions, now);

        if admissions.len() < self.max_admissions {
            return Duration::ZERO;
        }

        admissions.front().map_or(Duration::ZERO, |oldest| {
            self.window
                .saturating_sub(now.saturating_duration_since(*oldest))
        })
    }

    /// Current occupancy, for monitoring
    pub fn stats(&self) -> RateLimitStats {
        let now = Instant::now();
        let mut admissions = self.admissions.lock();
        self.prune(&mut admissions, now);

        RateLimitStats {
            in_window: admissions.len(),
            max_admissions: self.max_admissions,
            window: self.window,
        }
    }
}

/// Snapshot of a rate limiter's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Admissions still inside the window
    pub in_window: usize,
    /// Configured quota
    pub max_admissions: usize,
    /// Configured window length
    pub window: Duration,
}

//! Dispatch engine
//!
//! Owns the shared dispatch state and drives each message through the
//! pipeline:
//!
//! ```text
//! send_email ─> already sent / in flight? ──yes──> no-op
//!                      │ no
//!                      v
//!               rate limiter admits? ──no──> RateLimited
//!                      │ yes
//!                      v
//!           providers in priority order ──first success──> SentVia(provider)
//!                      │ all exhausted
//!                      v
//!                   Failed
//! ```
//!
//! `send_email` has no error channel. Every outcome except the duplicate
//! short-circuit is recorded in the status registry and read back with
//! [`DispatchEngine::get_status`].

use std::{collections::HashSet, fmt, sync::Arc};

use emissary_common::{Message, MessageId, internal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::DispatchConfig,
    error::ConfigError,
    idempotency::{Claim, IdempotencyStore},
    policy::{DeliveryOutcome, DispatchPipeline, RateLimitResult, RetryPolicy},
    provider::{Provider, Providers},
    rate_limiter::{RateLimitStats, RateLimiter},
    status::{DispatchStatus, StatusRegistry},
};

/// Idempotent, rate limited dispatcher with retry and provider fallback
pub struct DispatchEngine {
    providers: Providers,
    retry_policy: RetryPolicy,
    rate_limiter: RateLimiter,
    sent: IdempotencyStore,
    statuses: StatusRegistry,
}

impl fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("providers", &self.provider_names().collect::<Vec<_>>())
            .field("retry_policy", &self.retry_policy)
            .field("rate_limiter", &self.rate_limiter)
            .field("sent", &self.sent.len())
            .field("statuses", &self.statuses.len())
            .finish()
    }
}

impl DispatchEngine {
    /// Build an engine dispatching through `providers`, tried in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the provider list is
    /// empty, or two providers share a name.
    pub fn new(providers: Providers, config: &DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        {
            let mut names = HashSet::with_capacity(providers.len());
            if let Some(duplicate) = providers.iter().find(|p| !names.insert(p.name())) {
                return Err(ConfigError::DuplicateProvider(duplicate.name().to_string()));
            }
        }

        internal!(
            level = DEBUG,
            "Dispatch engine ready with {} provider(s), {} per {}ms, {} attempt(s) per provider",
            providers.len(),
            config.rate_limit.max_admissions,
            config.rate_limit.window_ms,
            config.retry.max_attempts
        );

        Ok(Self {
            providers,
            retry_policy: config.retry.clone(),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            sent: IdempotencyStore::new(),
            statuses: StatusRegistry::new(),
        })
    }

    /// Dispatch `message` and record the outcome.
    ///
    /// Never fails; the result is available through [`Self::get_status`].
    pub async fn send_email(&self, message: &Message) {
        self.dispatch(message, None).await;
    }

    /// Like [`Self::send_email`], but gives up when `cancel` fires.
    ///
    /// A cancelled dispatch is recorded as [`DispatchStatus::Cancelled`], is
    /// not marked as sent, and may be sent again later.
    pub async fn send_email_with_cancel(&self, message: &Message, cancel: &CancellationToken) {
        self.dispatch(message, Some(cancel)).await;
    }

    /// Fire-and-forget dispatch on the current runtime.
    pub fn spawn(self: &Arc<Self>, message: Message) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.send_email(&message).await })
    }

    /// Fire-and-forget dispatch that stops when `cancel` fires.
    pub fn spawn_with_cancel(
        self: &Arc<Self>,
        message: Message,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.send_email_with_cancel(&message, &cancel).await })
    }

    /// Latest outcome for `id`, or `None` if it was never attempted.
    pub fn get_status(&self, id: &MessageId) -> Option<DispatchStatus> {
        self.statuses.get_status(id)
    }

    pub fn has_sent(&self, id: &MessageId) -> bool {
        self.sent.has_sent(id)
    }

    /// Every recorded outcome, ordered by id
    pub fn statuses(&self) -> Vec<(MessageId, DispatchStatus)> {
        self.statuses.snapshot()
    }

    pub fn rate_limit_stats(&self) -> RateLimitStats {
        self.rate_limiter.stats()
    }

    /// Provider names in fallback order
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|provider| provider.name())
    }

    async fn dispatch(&self, message: &Message, cancel: Option<&CancellationToken>) {
        let id = message.id();

        let claim = match self.sent.begin(id) {
            Claim::AlreadySent => {
                info!(message_id = %id, "[Idempotency] Email {id} already sent.");
                return;
            }
            Claim::InFlight => {
                info!(message_id = %id, "[Idempotency] Email {id} is already being dispatched.");
                return;
            }
            Claim::Acquired(claim) => claim,
        };

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            warn!(message_id = %id, "Dispatch cancelled before it started");
            self.statuses.set_status(id, DispatchStatus::Cancelled);
            return;
        }

        let pipeline =
            DispatchPipeline::new(&self.providers, &self.retry_policy, &self.rate_limiter);

        if let RateLimitResult::RateLimited { .. } = pipeline.check_rate_limit(id) {
            self.statuses.set_status(id, DispatchStatus::RateLimited);
            return;
        }

        let outcome = match cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    outcome = pipeline.deliver(message) => Some(outcome),
                }
            }
            None => Some(pipeline.deliver(message).await),
        };

        match outcome {
            Some(DeliveryOutcome::Sent { provider, attempts }) => {
                debug!(message_id = %id, %provider, attempts, "Recorded successful dispatch");
                // Status first, so a sent id always has its provider recorded
                self.statuses
                    .set_status(id, DispatchStatus::SentVia(provider));
                claim.complete();
            }
            Some(DeliveryOutcome::AllFailed { attempts }) => {
                debug!(message_id = %id, attempts, "Recorded failed dispatch");
                self.statuses.set_status(id, DispatchStatus::Failed);
            }
            None => {
                warn!(message_id = %id, "Dispatch cancelled");
                self.statuses.set_status(id, DispatchStatus::Cancelled);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;

    fn message(id: &str) -> Message {
        Message::new(id, "user@example.com", "testing", "this is a test email.")
    }

    #[test]
    fn test_rejects_empty_provider_list() {
        let err = DispatchEngine::new(Vec::new(), &DispatchConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::NoProviders);
    }

    #[test]
    fn test_rejects_duplicate_provider_names() {
        let providers: Providers = vec![
            Arc::new(ScriptedProvider::always_succeeds("providerA")),
            Arc::new(ScriptedProvider::always_fails("providerA")),
        ];
        let err = DispatchEngine::new(providers, &DispatchConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateProvider("providerA".to_string()));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let providers: Providers = vec![Arc::new(ScriptedProvider::always_succeeds("p"))];
        let mut config = DispatchConfig::default();
        config.rate_limit.max_admissions = 0;

        assert!(DispatchEngine::new(providers, &config).is_err());
    }

    #[test]
    fn test_provider_names_keep_order() {
        let providers: Providers = vec![
            Arc::new(ScriptedProvider::always_succeeds("providerB")),
            Arc::new(ScriptedProvider::always_succeeds("providerA")),
        ];
        let engine = DispatchEngine::new(providers, &DispatchConfig::default()).unwrap();

        assert_eq!(
            engine.provider_names().collect::<Vec<_>>(),
            vec!["providerB", "providerA"]
        );
        assert!(format!("{engine:?}").contains("providerB"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_sent_status() {
        let provider = Arc::new(ScriptedProvider::always_succeeds("providerA"));
        let providers: Providers = vec![provider.clone()];
        let engine = DispatchEngine::new(providers, &DispatchConfig::default()).unwrap();
        let message = message("email-001");

        assert_eq!(engine.get_status(message.id()), None);
        engine.send_email(&message).await;

        assert_eq!(
            engine.get_status(message.id()),
            Some(DispatchStatus::SentVia("providerA".to_string()))
        );
        assert!(engine.has_sent(message.id()));
        assert_eq!(engine.rate_limit_stats().in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_uses_message_id() {
        let providers: Providers = vec![Arc::new(ScriptedProvider::always_fails("providerA"))];
        let engine = DispatchEngine::new(providers, &DispatchConfig::default()).unwrap();
        let message = message("email-001");

        engine.send_email(&message).await;

        assert_eq!(engine.get_status(message.id()), Some(DispatchStatus::Failed));
        assert_eq!(
            engine.statuses(),
            vec![(message.id().clone(), DispatchStatus::Failed)]
        );
        assert!(!engine.has_sent(message.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token_skips_limiter() {
        let provider = Arc::new(ScriptedProvider::always_succeeds("providerA"));
        let providers: Providers = vec![provider.clone()];
        let engine = DispatchEngine::new(providers, &DispatchConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        engine
            .send_email_with_cancel(&message("email-001"), &cancel)
            .await;

        assert_eq!(
            engine.get_status(&MessageId::new("email-001")),
            Some(DispatchStatus::Cancelled)
        );
        assert_eq!(provider.calls(), 0);
        assert_eq!(engine.rate_limit_stats().in_window, 0);
    }
}

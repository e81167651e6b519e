use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use emissary_common::{Message, MessageId};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::Provider;
use crate::error::ProviderError;

/// Deterministic provider that follows a fixed script of outcomes
///
/// Each call consumes the next scripted outcome; once the script runs out,
/// every further call gets the fallback outcome. Calls are recorded so tests
/// can assert on attempt counts and the spacing between attempts.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    latency: Duration,
    calls: AtomicUsize,
    history: Mutex<Vec<(MessageId, Instant)>>,
}

impl ScriptedProvider {
    /// Follow `script` (`true` = success), then fail forever
    pub fn new(name: impl Into<String>, script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script.into_iter().collect()),
            fallback: false,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn always_succeeds(name: impl Into<String>) -> Self {
        Self::new(name, []).then(true)
    }

    pub fn always_fails(name: impl Into<String>) -> Self {
        Self::new(name, []).then(false)
    }

    /// Outcome once the script is exhausted
    #[must_use]
    pub const fn then(mut self, outcome: bool) -> Self {
        self.fallback = outcome;
        self
    }

    /// Delay every call by `latency` before answering
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `send` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which each call started, in call order
    pub fn call_times(&self) -> Vec<Instant> {
        self.history.lock().iter().map(|(_, at)| *at).collect()
    }

    /// Ids passed to each call, in call order
    pub fn call_ids(&self) -> Vec<MessageId> {
        self.history.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .push((message.id().clone(), Instant::now()));

        let outcome = self.script.lock().pop_front().unwrap_or(self.fallback);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if outcome {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!("{} failed", self.name)))
        }
    }
}

use std::{future::Future, sync::Arc};

use emissary_common::{Message, MessageId, internal};
use emissary_dispatch::{
    CancellationToken, DispatchConfig, DispatchEngine, DispatchStatus, MockProvider,
    MockProviderConfig, Provider, Providers,
};
use futures_util::future::join_all;
use serde::Deserialize;

/// Top-level configuration: how to dispatch, through which providers, and what
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Emissary {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Providers in fallback order
    #[serde(alias = "provider", default = "default_providers")]
    pub providers: Vec<MockProviderConfig>,

    /// Messages to dispatch on startup
    #[serde(alias = "message", default)]
    pub messages: Vec<Message>,
}

fn default_providers() -> Vec<MockProviderConfig> {
    ["providerA", "providerB"]
        .into_iter()
        .map(|name| MockProviderConfig {
            name: name.to_string(),
            success_rate: 0.7,
        })
        .collect()
}

impl Default for Emissary {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            providers: default_providers(),
            messages: vec![Message::new(
                "email-001",
                "user@example.com",
                "testing",
                "this is a test email.",
            )],
        }
    }
}

/// Final status of every configured message, in configuration order
pub type Report = Vec<(MessageId, Option<DispatchStatus>)>;

impl Emissary {
    /// Build the dispatch engine described by this configuration
    ///
    /// # Errors
    ///
    /// If the dispatch configuration or the provider list is invalid.
    pub fn engine(&self) -> anyhow::Result<DispatchEngine> {
        let providers: Providers = self
            .providers
            .iter()
            .map(|config| Arc::new(MockProvider::from(config)) as Arc<dyn Provider>)
            .collect();

        Ok(DispatchEngine::new(providers, &self.dispatch)?)
    }

    /// Dispatch every configured message, cancelling in-flight work on Ctrl+C
    ///
    /// # Errors
    ///
    /// If the engine cannot be built or a dispatch task panics.
    pub async fn run(self) -> anyhow::Result<Report> {
        self.run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                internal!(
                    level = WARN,
                    "CTRL+C entered -- cancelling in-flight dispatches"
                );
            } else {
                // No signal handler available, never cancel
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Dispatch every configured message, cancelling in-flight work once `shutdown` resolves
    ///
    /// # Errors
    ///
    /// If the engine cannot be built or a dispatch task panics.
    #[tracing::instrument(level = tracing::Level::TRACE, skip_all, err)]
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> anyhow::Result<Report> {
        let engine = Arc::new(self.engine()?);
        let cancel = CancellationToken::new();

        internal!(
            level = INFO,
            "Dispatching {} message(s) via {}",
            self.messages.len(),
            engine.provider_names().collect::<Vec<_>>().join(" -> ")
        );

        let ids: Vec<MessageId> = self.messages.iter().map(|m| m.id().clone()).collect();
        let handles = self
            .messages
            .into_iter()
            .map(|message| engine.spawn_with_cancel(message, cancel.child_token()))
            .collect::<Vec<_>>();

        let dispatches = join_all(handles);
        tokio::pin!(dispatches);

        let results = tokio::select! {
            results = &mut dispatches => results,
            () = shutdown => {
                cancel.cancel();
                dispatches.await
            }
        };

        for result in results {
            result?;
        }

        let report: Report = ids
            .into_iter()
            .map(|id| {
                let status = engine.get_status(&id);
                internal!(
                    level = INFO,
                    "status: {} -> {}",
                    id,
                    status
                        .as_ref()
                        .map_or_else(|| "unknown".to_string(), ToString::to_string)
                );
                (id, status)
            })
            .collect();

        internal!("Dispatch run complete");
        Ok(report)
    }
}

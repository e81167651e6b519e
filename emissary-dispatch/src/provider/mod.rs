//! Delivery providers
//!
//! A provider is anything that can attempt to hand a [`Message`] to the
//! outside world. The dispatch engine holds an ordered list of them, treats
//! the order as fallback priority, and never looks past this trait.

mod mock;
mod scripted;

use std::sync::Arc;

use async_trait::async_trait;
use emissary_common::Message;

pub use mock::{MockProvider, MockProviderConfig};
pub use scripted::ScriptedProvider;

use crate::error::ProviderError;

/// Capability to attempt delivery of a single message
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used in `SentVia` statuses and logs
    fn name(&self) -> &str;

    /// Attempt one delivery.
    ///
    /// # Errors
    ///
    /// Any failure. The engine does not distinguish between causes.
    async fn send(&self, message: &Message) -> Result<(), ProviderError>;
}

/// Ordered, shareable provider list
pub type Providers = Vec<Arc<dyn Provider>>;

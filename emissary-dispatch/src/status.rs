//! Latest dispatch outcome per message

use std::{
    fmt::{self, Display},
    sync::Arc,
};

use dashmap::DashMap;
use emissary_common::MessageId;
use serde::{Deserialize, Serialize};

/// Outcome of the most recent dispatch of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchStatus {
    /// Rejected by the rate limiter; the caller may send again later
    RateLimited,
    /// Delivered through the named provider
    SentVia(String),
    /// Every provider exhausted its attempts
    Failed,
    /// The caller cancelled the dispatch before it finished
    Cancelled,
}

impl DispatchStatus {
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::SentVia(_))
    }
}

impl Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => f.write_str("Rate limited"),
            Self::SentVia(provider) => write!(f, "Sent via {provider}"),
            Self::Failed => f.write_str("Failed"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Concurrent map of message id to latest status. Last write wins.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    statuses: Arc<DashMap<MessageId, DispatchStatus>>,
}

impl StatusRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, id: &MessageId, status: DispatchStatus) {
        self.statuses.insert(id.clone(), status);
    }

    /// `None` if no dispatch of `id` has ever recorded an outcome
    pub fn get_status(&self, id: &MessageId) -> Option<DispatchStatus> {
        self.statuses.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Every recorded status, ordered by id
    pub fn snapshot(&self) -> Vec<(MessageId, DispatchStatus)> {
        let mut all: Vec<_> = self
            .statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|(a, _), (b, _)| a.cmp(b));
        all
    }
}

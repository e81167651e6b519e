//! Typed errors for dispatch operations.
//!
//! Provider failures never escape the dispatch path; they are absorbed by the
//! retry loop and the fallback across providers and end up as a status. The
//! only errors a caller sees are configuration errors at construction time.

use thiserror::Error;

/// A single failed call to a provider.
///
/// The engine treats every variant the same way: the attempt failed and may
/// be retried. The distinction only exists for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Provider could not be reached.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Invalid static configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value that must be non-zero was zero.
    #[error("Invalid configuration for {field}: must be greater than zero")]
    Zero { field: &'static str },

    /// The engine was given no providers to dispatch through.
    #[error("At least one provider must be configured")]
    NoProviders,

    /// Two providers share a name, which would make `SentVia` ambiguous.
    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        assert_eq!(
            ProviderError::Unavailable("providerA".to_string()).to_string(),
            "Provider unavailable: providerA"
        );
        assert_eq!(
            ProviderError::Other("providerB failed".to_string()).to_string(),
            "providerB failed"
        );
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::Zero {
                field: "rate_limit.max_admissions"
            }
            .to_string(),
            "Invalid configuration for rate_limit.max_admissions: must be greater than zero"
        );
        assert_eq!(
            ConfigError::DuplicateProvider("providerA".to_string()).to_string(),
            "Duplicate provider name: providerA"
        );
    }
}

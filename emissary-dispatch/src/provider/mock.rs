use async_trait::async_trait;
use emissary_common::{Message, outgoing};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Provider;
use crate::error::ProviderError;

/// Configuration for a [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockProviderConfig {
    pub name: String,

    /// Probability in `[0, 1]` that a send succeeds
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

const fn default_success_rate() -> f64 {
    0.7
}

/// Stand-in provider that logs the send and succeeds at random
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    success_rate: f64,
}

impl MockProvider {
    /// `success_rate` is clamped to `[0, 1]`
    pub fn new(name: impl Into<String>, success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };

        Self {
            name: name.into(),
            success_rate,
        }
    }

    pub const fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl From<&MockProviderConfig> for MockProvider {
    fn from(config: &MockProviderConfig) -> Self {
        Self::new(config.name.clone(), config.success_rate)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<(), ProviderError> {
        outgoing!(
            level = INFO,
            "[{}] sending email to {}",
            self.name,
            message.recipient()
        );

        if rand::rng().random_bool(self.success_rate) {
            Ok(())
        } else {
            Err(ProviderError::Other(format!("{} failed", self.name)))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::new("email-001", "user@example.com", "testing", "body")
    }

    #[test]
    fn test_success_rate_is_clamped() {
        assert!((MockProvider::new("a", 1.5).success_rate() - 1.0).abs() < f64::EPSILON);
        assert!(MockProvider::new("a", -0.5).success_rate().abs() < f64::EPSILON);
        assert!(MockProvider::new("a", f64::NAN).success_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_config() {
        let config: MockProviderConfig = ron::from_str(r#"(name: "providerA")"#).unwrap();
        let provider = MockProvider::from(&config);

        assert_eq!(provider.name(), "providerA");
        assert!((provider.success_rate() - 0.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_certain_outcomes() {
        let always = MockProvider::new("always", 1.0);
        let never = MockProvider::new("never", 0.0);

        for _ in 0..20 {
            assert!(always.send(&message()).await.is_ok());
            assert_eq!(
                never.send(&message()).await,
                Err(ProviderError::Other("never failed".to_string()))
            );
        }
    }
}

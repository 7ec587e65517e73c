use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::MAX_PUBLIC_KEYS_PER_REQUEST;

/// Tunables for the private-content pipeline
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Accounts per public-key request; chunks are issued one after another
    #[serde(default = "default_key_batch_size")]
    pub key_batch_size: usize,
    /// Items requested per feed page
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// Deadline for best-effort private fetches before degrading to an empty page
    #[serde(default = "default_private_fetch_timeout_ms")]
    pub private_fetch_timeout_ms: u64,
    /// How long a cached trusted circle stays valid
    #[serde(default = "default_trusted_circle_ttl_secs")]
    pub trusted_circle_ttl_secs: u64,
}

fn default_key_batch_size() -> usize {
    25
}

fn default_page_limit() -> usize {
    50
}

fn default_private_fetch_timeout_ms() -> u64 {
    2_000
}

fn default_trusted_circle_ttl_secs() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_batch_size: default_key_batch_size(),
            page_limit: default_page_limit(),
            private_fetch_timeout_ms: default_private_fetch_timeout_ms(),
            trusted_circle_ttl_secs: default_trusted_circle_ttl_secs(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "key_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.key_batch_size > MAX_PUBLIC_KEYS_PER_REQUEST {
            return Err(ConfigError::Invalid(format!(
                "key_batch_size must be at most {}, got {}",
                MAX_PUBLIC_KEYS_PER_REQUEST, self.key_batch_size
            )));
        }
        if self.page_limit == 0 {
            return Err(ConfigError::Invalid(
                "page_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn private_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.private_fetch_timeout_ms)
    }

    pub fn trusted_circle_ttl(&self) -> Duration {
        Duration::from_secs(self.trusted_circle_ttl_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.key_batch_size, 25);
    }

    #[test]
    fn test_partial_document() {
        let config = PipelineConfig::from_toml_str("page_limit = 10\n").unwrap();
        assert_eq!(config.page_limit, 10);
        assert_eq!(config.private_fetch_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = PipelineConfig::from_toml_str("key_batch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_batch_size_above_request_limit_rejected() {
        let err = PipelineConfig::from_toml_str("key_batch_size = 30\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = PipelineConfig::from_toml_str("key_batch_size = 25\n").unwrap();
        assert_eq!(config.key_batch_size, MAX_PUBLIC_KEYS_PER_REQUEST);
    }
}

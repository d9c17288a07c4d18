//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::ops::RangeInclusive;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn check_range<T>(field: &str, value: T, range: RangeInclusive<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field: field.into(),
        reason: format!("must be between {} and {}, got {value}", range.start(), range.end()),
    })
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - a cache, network or screenshot limit is outside its range
    /// - `network.user_agent` is empty
    /// - `llm.base_url` is empty while the LLM is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("cache.max_entries", self.cache.max_entries, 10..=1000)?;
        check_range("cache.ttl_minutes", self.cache.ttl_minutes, 5..=10_080)?;
        check_range("cache.preload_count", self.cache.preload_count, 0..=100)?;

        check_range("network.timeout_ms", self.network.timeout_ms, 5_000..=300_000)?;
        check_range("network.retry_count", self.network.retry_count, 0..=10)?;
        check_range("network.retry_delay_ms", self.network.retry_delay_ms, 0..=10_000)?;
        check_range("network.max_concurrency", self.network.max_concurrency, 1..=20)?;
        if self.network.max_content_length < 1000 {
            return Err(ConfigError::Invalid {
                field: "network.max_content_length".into(),
                reason: "must be at least 1000".into(),
            });
        }
        if self.network.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "network.user_agent".into(), reason: "must not be empty".into() });
        }

        if self.llm.enabled && self.llm.base_url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "llm.base_url".into(),
                reason: "must not be empty when llm is enabled".into(),
            });
        }

        check_range("screenshot.quality", self.screenshot.quality, 1..=100)?;
        check_range("screenshot.pool_size", self.screenshot.pool_size, 1..=8)?;
        if self.screenshot.width == 0 || self.screenshot.height == 0 {
            return Err(ConfigError::Invalid {
                field: "screenshot.width".into(),
                reason: "viewport dimensions must be non-zero".into(),
            });
        }

        if !self.domains.allowlist.is_empty() && !self.domains.blocklist.is_empty() {
            tracing::warn!(
                allowlist_count = self.domains.allowlist.len(),
                blocklist_count = self.domains.blocklist.len(),
                "Both allowlist and blocklist are set; \
                 blocklist takes precedence"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_entries_bounds() {
        let mut config = AppConfig::default();
        config.cache.max_entries = 9;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache.max_entries"));

        config.cache.max_entries = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ttl_bounds() {
        let mut config = AppConfig::default();
        config.cache.ttl_minutes = 4;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache.ttl_minutes"));

        config.cache.ttl_minutes = 10_081;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let mut config = AppConfig::default();
        config.network.timeout_ms = 4_999;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "network.timeout_ms"));
    }

    #[test]
    fn test_validate_concurrency_zero() {
        let mut config = AppConfig::default();
        config.network.max_concurrency = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "network.max_concurrency"));
    }

    #[test]
    fn test_validate_content_length() {
        let mut config = AppConfig::default();
        config.network.max_content_length = 999;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "network.max_content_length"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let mut config = AppConfig::default();
        config.network.user_agent = String::new();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "network.user_agent"));
    }

    #[test]
    fn test_validate_screenshot_quality() {
        let mut config = AppConfig::default();
        config.screenshot.quality = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "screenshot.quality"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let mut config = AppConfig::default();
        config.cache.ttl_minutes = 5;
        config.cache.preload_count = 0;
        config.network.retry_count = 0;
        config.network.retry_delay_ms = 0;
        config.network.max_concurrency = 20;
        config.network.timeout_ms = 300_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_range_error_message() {
        let err = check_range("x", 30, 1..=20).unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: x - must be between 1 and 20, got 30");
    }
}

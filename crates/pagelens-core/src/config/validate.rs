//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.parallel == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.parallel must be > 0".into(),
            ));
        }
        if self.dispatch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.timeout_ms must be > 0".into(),
            ));
        }
        if self.dispatch.list_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.list_timeout_ms must be > 0".into(),
            ));
        }
        if self.rate_limit.tokens_per_second < 0.0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.tokens_per_second must be >= 0".into(),
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.max_tokens < 1.0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.max_tokens must be >= 1 when rate limiting is enabled".into(),
            ));
        }
        if self.discovery.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "discovery.supported_formats must not be empty".into(),
            ));
        }
        if self.general.default_provider.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "general.default_provider must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel() {
        let mut config = Config::default();
        config.dispatch.parallel = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dispatch.parallel"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.dispatch.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_negative_rate() {
        let mut config = Config::default();
        config.rate_limit.tokens_per_second = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tokens_per_second"));
    }

    #[test]
    fn test_validate_rejects_bucket_smaller_than_one_call() {
        let mut config = Config::default();
        config.rate_limit.max_tokens = 0.5;
        assert!(config.validate().is_err());

        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
    }
}

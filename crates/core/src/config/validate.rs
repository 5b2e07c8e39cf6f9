use std::collections::HashSet;

use super::{types::Config, ConfigError, ProviderConfig};

/// Validate configuration
/// Currently validates:
/// - Timeouts and intervals are non-zero
/// - At least one playable extension is configured
/// - Provider names are unique and Jackett entries are complete
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.search.provider_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.provider_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "cache.ttl_secs cannot be 0".to_string(),
        ));
    }

    if config.cache.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "cache.sweep_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.downloads.add_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.add_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.downloads.sample_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.sample_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.downloads.reaper_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.reaper_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.downloads.playable_extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "downloads.playable_extensions cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for provider in &config.search.providers {
        if !seen.insert(provider.name()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate provider name: {}",
                provider.name()
            )));
        }

        if let ProviderConfig::Jackett(j) = provider {
            if j.url.is_empty() || j.api_key.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "jackett provider {} needs url and api_key",
                    j.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EztvConfig, JackettConfig};

    fn eztv(name: &str) -> ProviderConfig {
        ProviderConfig::Eztv(EztvConfig {
            name: name.to_string(),
            url: "https://eztv.re".to_string(),
            rate_limit_rpm: None,
        })
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_ttl_fails() {
        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_sweep_interval_fails() {
        let mut config = Config::default();
        config.cache.sweep_interval_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("cache.sweep_interval_secs"));
    }

    #[test]
    fn test_validate_zero_add_timeout_fails() {
        let mut config = Config::default();
        config.downloads.add_timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("downloads.add_timeout_secs"));
    }

    #[test]
    fn test_validate_zero_provider_timeout_fails() {
        let mut config = Config::default();
        config.search.provider_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_extensions_fails() {
        let mut config = Config::default();
        config.downloads.playable_extensions.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_provider_names_fails() {
        let mut config = Config::default();
        config.search.providers = vec![eztv("EZTV"), eztv("EZTV")];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate provider name"));
    }

    #[test]
    fn test_validate_incomplete_jackett_fails() {
        let mut config = Config::default();
        config.search.providers = vec![ProviderConfig::Jackett(JackettConfig {
            name: "jackett".to_string(),
            url: "http://localhost:9117".to_string(),
            api_key: String::new(),
            indexer: "all".to_string(),
            rate_limit_rpm: None,
        })];
        assert!(validate_config(&config).is_err());
    }
}

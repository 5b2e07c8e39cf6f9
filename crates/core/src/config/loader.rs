use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for overrides, e.g. `SEEDSCOUT_CACHE__TTL_SECS=60`.
const ENV_PREFIX: &str = "SEEDSCOUT_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_env_overrides_nested_sections() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "seedscout.toml",
                r#"
[cache]
ttl_secs = 600

[downloads]
root_dir = "/srv/downloads"
"#,
            )?;
            jail.set_env("SEEDSCOUT_CACHE__TTL_SECS", 60);
            jail.set_env("SEEDSCOUT_DOWNLOADS__ADD_TIMEOUT_SECS", 30);
            jail.set_env("SEEDSCOUT_LOGGING__JSON", true);

            let config = load_config(Path::new("seedscout.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.cache.ttl_secs, 60);
            assert_eq!(config.downloads.add_timeout_secs, 30);
            assert!(config.logging.json);
            // Untouched keys keep the file value or the default
            assert_eq!(config.downloads.root_dir.to_str(), Some("/srv/downloads"));
            assert_eq!(config.search.default_limit, 20);
            Ok(())
        });
    }

    #[test]
    fn test_env_override_with_wrong_type_is_parse_error() {
        Jail::expect_with(|jail| {
            jail.create_file("seedscout.toml", "")?;
            jail.set_env("SEEDSCOUT_SEARCH__PROVIDER_TIMEOUT_SECS", "soon");

            let result = load_config(Path::new("seedscout.toml"));
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn test_unprefixed_env_is_ignored() {
        Jail::expect_with(|jail| {
            jail.create_file("seedscout.toml", "[cache]\nttl_secs = 900\n")?;
            jail.set_env("CACHE__TTL_SECS", 5);

            let config = load_config(Path::new("seedscout.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.cache.ttl_secs, 900);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[cache]
ttl_secs = 120

[downloads]
root_dir = "/srv/downloads"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.downloads.root_dir.to_str().unwrap(), "/srv/downloads");
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[cache]
ttl_secs = "one hour"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/seedscout.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[search]
provider_timeout_secs = 5

[[search.providers]]
kind = "eztv"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.search.provider_timeout_secs, 5);
        assert_eq!(config.search.providers.len(), 1);
        assert_eq!(config.search.providers[0].name(), "EZTV");
    }
}

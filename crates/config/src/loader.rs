//! Configuration loader implementation

use crate::schema::Config;
use crate::validation::ConfigValidator;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use std::path::Path;
use types::{BridgeError, ConfigError};

/// Prefix for environment overrides, nested keys separated by `__`,
/// e.g. `JD_BRIDGE_JDOWNLOADER__HOST=nas.local`
pub const ENV_PREFIX: &str = "JD_BRIDGE_";

/// Configuration loader that handles YAML files and environment variables
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Config> {
        let config_path = config_path.as_ref();

        if !config_path.exists() {
            return Err(BridgeError::from(ConfigError::FileNotFound {
                path: config_path.display().to_string(),
            })
            .into());
        }

        let config: Config = Figment::new()
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to parse configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Built-in defaults overridden by environment variables only
    pub fn load_from_env() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to parse configuration from environment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from string (for testing)
    pub fn load_from_str(yaml_content: &str) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Yaml::string(yaml_content))
            .extract()
            .context("Failed to parse configuration from string")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Reject configurations with errors; warnings are left to the caller
    fn validate(config: &Config) -> Result<()> {
        let report = ConfigValidator::validate(config);
        if let Some(issue) = report.errors.first() {
            return Err(BridgeError::from(ConfigError::ValidationError {
                field: issue.field.clone(),
                message: issue.message.clone(),
            })
            .into());
        }
        Ok(())
    }

    /// Get default configuration
    pub fn default() -> Config {
        Config::default()
    }

    /// Create example configuration file
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Self::default();
        let yaml_content = serde_yaml::to_string(&config)
            .context("Failed to serialize default configuration")?;

        std::fs::write(path.as_ref(), yaml_content)
            .context("Failed to write example configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GatewayMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::default();
        assert_eq!(config.jdownloader.host, "127.0.0.1");
        assert_eq!(config.jdownloader.port, 3128);
        assert_eq!(config.jdownloader.mode, GatewayMode::Real);
        assert_eq!(config.jdownloader.poll_interval_ms, 3_000);
        assert!(config.security.api_token.is_none());
    }

    #[test]
    fn test_load_from_string() {
        let yaml_content = r#"
jdownloader:
  host: "http://nas.local/"
  port: 3129
  mode: simulated
  pollIntervalMs: 1500
  deliveryTimeoutMs: 4000
security:
  api_token: "0123456789abcdef"
replay:
  interval_seconds: 10
"#;

        let config = ConfigLoader::load_from_str(yaml_content).unwrap();
        assert_eq!(config.jdownloader.mode, GatewayMode::Simulated);
        assert_eq!(config.jdownloader.poll_interval_ms, 1500);
        assert_eq!(config.jdownloader.delivery_timeout_ms, 4000);
        assert_eq!(config.jdownloader.api_url(), "http://nas.local:3129");
        assert_eq!(config.replay.interval_seconds, 10);
        assert_eq!(config.security.api_token.as_deref(), Some("0123456789abcdef"));
        // untouched sections fall back to defaults
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_validation_errors() {
        let yaml_content = r#"
jdownloader:
  port: 0
"#;
        assert!(ConfigLoader::load_from_str(yaml_content).is_err());

        let yaml_content = r#"
jdownloader:
  mode: bogus
"#;
        assert!(ConfigLoader::load_from_str(yaml_content).is_err());

        let yaml_content = r#"
logging:
  format: "xml"
"#;
        assert!(ConfigLoader::load_from_str(yaml_content).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigLoader::load("/definitely/not/here/config.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 9100\njdownloader:\n  mode: simulated").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.jdownloader.mode, GatewayMode::Simulated);
    }

    #[test]
    fn test_create_example() {
        let temp_file = NamedTempFile::new().unwrap();
        let result = ConfigLoader::create_example(temp_file.path());
        assert!(result.is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("jdownloader:"));
        assert!(content.contains("poll_interval_ms"));

        // the example must load back cleanly
        assert!(ConfigLoader::load(temp_file.path()).is_ok());
    }
}

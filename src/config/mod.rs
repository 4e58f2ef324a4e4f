use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "LIGHTSTRIP_CONFIG";

/// Config file used when `LIGHTSTRIP_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "lightstrip.toml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LightConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub strip: StripConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Upper bound for one API call, strip flush included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// LED strip configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StripConfig {
    /// Number of addressable pixels
    #[serde(default = "default_led_count")]
    pub led_count: usize,
}

fn default_led_count() -> usize {
    100
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            led_count: default_led_count(),
        }
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "light.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl LightConfig {
    /// Load from `LIGHTSTRIP_CONFIG` (or `lightstrip.toml`), then apply
    /// environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            load_config(&path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LIGHTSTRIP_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("LIGHTSTRIP_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("LIGHTSTRIP_REQUEST_TIMEOUT_MS") {
            self.server.request_timeout_ms = v
                .parse()
                .with_context(|| format!("Invalid LIGHTSTRIP_REQUEST_TIMEOUT_MS: {}", v))?;
        }
        if let Some(v) = lookup("LIGHTSTRIP_LED_COUNT") {
            self.strip.led_count = v
                .parse()
                .with_context(|| format!("Invalid LIGHTSTRIP_LED_COUNT: {}", v))?;
        }
        if let Some(v) = lookup("LIGHTSTRIP_DB_PATH") {
            self.storage.database_path = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.strip.led_count == 0 {
            bail!("strip.led_count must be greater than 0");
        }
        if self.server.request_timeout_ms == 0 {
            bail!("server.request_timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<LightConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
    let config: LightConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LightConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.server.request_timeout(), Duration::from_millis(2000));
        assert_eq!(config.strip.led_count, 100);
        assert_eq!(config.storage.database_path, "light.db");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:8080"
            request_timeout_ms = 500

            [strip]
            led_count = 300

            [storage]
            database_path = "/var/lib/lightstrip/light.db"
        "#;

        let config: LightConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.request_timeout_ms, 500);
        assert_eq!(config.strip.led_count, 300);
        assert_eq!(config.storage.database_path, "/var/lib/lightstrip/light.db");
    }

    #[test]
    fn test_partial_config() {
        // Missing sections and keys use defaults
        let toml = r#"
            [strip]
            led_count = 60
        "#;

        let config: LightConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.strip.led_count, 60);
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.storage.database_path, "light.db");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LIGHTSTRIP_BIND_ADDR", "127.0.0.1:9000"),
            ("LIGHTSTRIP_LED_COUNT", "42"),
            ("LIGHTSTRIP_DB_PATH", "/tmp/strip.db"),
        ]
        .into_iter()
        .collect();

        let mut config = LightConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.strip.led_count, 42);
        assert_eq!(config.storage.database_path, "/tmp/strip.db");
        assert_eq!(config.server.request_timeout_ms, 2000);
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let mut config = LightConfig::default();
        let err = config
            .apply_overrides(|key| (key == "LIGHTSTRIP_LED_COUNT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("LIGHTSTRIP_LED_COUNT"));
    }

    #[test]
    fn test_zero_leds_rejected() {
        let mut config = LightConfig::default();
        config.strip.led_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightstrip.toml");
        std::fs::write(&path, "[server]\nbind_addr = \"127.0.0.1:1234\"\n").unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:1234");
        assert_eq!(config.strip.led_count, 100);
    }
}

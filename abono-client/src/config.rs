//! Configuration loading for the abono console client.
//!
//! `api_base_url` and `request_timeout_ms` are required. The `auth`, `sync`
//! and `log` tables are optional and fall back to the documented defaults.

use abono_sync::SyncConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "ABONO_CONFIG";

pub const DEFAULT_GC_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSection {
    pub search_debounce_ms: u64,
    pub cache_time_ms: u64,
    pub stale_time_ms: Option<u64>,
    /// How often unobserved cache entries are swept. `None` disables it.
    pub gc_interval_ms: Option<u64>,
}

impl Default for SyncSection {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            search_debounce_ms: defaults.debounce_delay.as_millis() as u64,
            cache_time_ms: defaults.cache_time.as_millis() as u64,
            stale_time_ms: None,
            gc_interval_ms: Some(DEFAULT_GC_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "abono=info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or ABONO_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

impl ClientConfig {
    /// Load from `path` (the `--config` flag) or `ABONO_CONFIG`, then validate.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = path
            .or_else(config_path_from_env)
            .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid("api_base_url", "must start with http:// or https://"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.auth.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(invalid("auth.api_key", "must not be empty when set"));
        }
        if self
            .auth
            .bearer_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(invalid("auth.bearer_token", "must not be empty when set"));
        }
        if self.sync.search_debounce_ms == 0 {
            return Err(invalid("sync.search_debounce_ms", "must be > 0"));
        }
        if self.sync.cache_time_ms == 0 {
            return Err(invalid("sync.cache_time_ms", "must be > 0"));
        }
        if self.sync.gc_interval_ms == Some(0) {
            return Err(invalid("sync.gc_interval_ms", "must be > 0 when set"));
        }
        if self.log.filter.trim().is_empty() {
            return Err(invalid("log.filter", "must not be empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Cache store settings derived from the `sync` table.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new()
            .with_cache_time(Duration::from_millis(self.sync.cache_time_ms))
            .with_debounce(Duration::from_millis(self.sync.search_debounce_ms));
        if let Some(ms) = self.sync.stale_time_ms {
            config = config.with_stale_time(Duration::from_millis(ms));
        }
        if let Some(ms) = self.sync.gc_interval_ms {
            config = config.with_gc_interval(Duration::from_millis(ms));
        }
        config
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
api_base_url = "http://localhost:8080"
request_timeout_ms = 5000
"#;

    #[test]
    fn optional_tables_use_defaults() {
        let config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.sync.search_debounce_ms, 400);
        assert_eq!(config.log.filter, "abono=info");
        assert_eq!(config.auth, AuthConfig::default());
        assert_eq!(config.sync_config().stale_time, None);
        assert_eq!(
            config.sync_config().gc_interval,
            Some(Duration::from_millis(DEFAULT_GC_INTERVAL_MS))
        );
    }

    #[test]
    fn zero_gc_interval_is_rejected() {
        let toml = format!("{}
[sync]
gc_interval_ms = 0
", MINIMAL);
        let config = ClientConfig::from_toml(&toml).unwrap();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "sync.gc_interval_ms")
            }
            other => panic!("expected invalid gc interval, got {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml = format!("{}\nrefresh_interval_ms = 10\n", MINIMAL);
        assert!(matches!(
            ClientConfig::from_toml(&toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validate_reports_the_failing_field() {
        let mut config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.api_base_url = "localhost:8080".to_string();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "api_base_url"),
            other => panic!("expected invalid api_base_url, got {:?}", other),
        }

        let mut config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.auth.api_key = Some("  ".to_string());
        assert!(config.validate().is_err());
    }
}

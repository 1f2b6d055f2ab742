//! Configuration for the autosave engine and its collaborators.
//!
//! Every config has sensible defaults, `with_*` builders for callers that
//! embed the engine, and a `from_env` constructor used by the binary.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Tuning for the debounce scheduler and payload sanitizer
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before a save fires
    pub debounce: Duration,
    /// Ignore the first change after spawn (initial hydration)
    pub skip_initial_change: bool,
    /// Per-field ceiling for embedded block media (default: 1MB)
    pub max_field_bytes: usize,
    /// Ceiling for the whole serialized payload (default: 5MB)
    pub max_payload_bytes: usize,
    /// Skip timer-triggered updates identical to the last saved payload
    pub skip_unchanged: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            skip_initial_change: true,
            max_field_bytes: 1024 * 1024,       // 1MB
            max_payload_bytes: 5 * 1024 * 1024, // 5MB
            skip_unchanged: false,
        }
    }
}

impl AutosaveConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            debounce: env_parse::<u64>("AUTOSAVE_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            skip_initial_change: env_bool("AUTOSAVE_SKIP_INITIAL")?
                .unwrap_or(defaults.skip_initial_change),
            max_field_bytes: env_parse("AUTOSAVE_MAX_FIELD_BYTES")?
                .unwrap_or(defaults.max_field_bytes),
            max_payload_bytes: env_parse("AUTOSAVE_MAX_PAYLOAD_BYTES")?
                .unwrap_or(defaults.max_payload_bytes),
            skip_unchanged: env_bool("AUTOSAVE_SKIP_UNCHANGED")?
                .unwrap_or(defaults.skip_unchanged),
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_skip_initial_change(mut self, enabled: bool) -> Self {
        self.skip_initial_change = enabled;
        self
    }

    pub fn with_limits(mut self, max_field_bytes: usize, max_payload_bytes: usize) -> Self {
        self.max_field_bytes = max_field_bytes;
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn with_skip_unchanged(mut self, enabled: bool) -> Self {
        self.skip_unchanged = enabled;
        self
    }
}

/// Connection settings for the posts API
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://cms.example.com/api`
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("AUTOSAVE_API_URL").map_err(|_| ConfigError::Missing("AUTOSAVE_API_URL"))?;

        let mut config = Self::new(base_url);
        config.api_token = std::env::var("AUTOSAVE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        if let Some(ms) = env_parse::<u64>("AUTOSAVE_API_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "AUTOSAVE_API_URL",
                value: self.base_url.clone(),
            });
        }
        Ok(())
    }
}

/// Configuration for the durable checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Path to the Sled database directory
    pub path: String,
    /// Flush interval in milliseconds (0 = flush on every write)
    pub flush_interval_ms: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: "./data/autosave.sled".to_string(),
            flush_interval_ms: 0,
        }
    }
}

impl CheckpointConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn from_env() -> Self {
        match std::env::var("AUTOSAVE_CHECKPOINT_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    pub fn with_flush_interval(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        Err(_) => Ok(None),
    }
}

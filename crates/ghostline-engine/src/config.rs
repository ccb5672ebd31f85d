use ghostline_providers::ProviderConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Engine tunables. Every field has a sensible default so an empty config
/// file (or none at all) works.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Feature switch; when false, `provide_completion` returns nothing.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Quiet period after a keystroke before a request is issued.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Predictions kept per open document.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// In-flight requests allowed per document.
    #[serde(default = "default_max_pending")]
    pub max_pending_requests: usize,
    /// Wall-clock deadline per prediction.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Lines of prefix/suffix context sent to the model, each direction.
    #[serde(default = "default_context_window_lines")]
    pub context_window_lines: usize,
    /// How long after an accept multi-line chaining stays armed.
    #[serde(default = "default_accept_chain_window_ms")]
    pub accept_chain_window_ms: u64,
    /// Newlines allowed in a multi-line completion before truncation.
    #[serde(default = "default_newline_budget")]
    pub newline_budget: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_cache_capacity() -> usize {
    20
}

fn default_max_pending() -> usize {
    2
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_context_window_lines() -> usize {
    25
}

fn default_accept_chain_window_ms() -> u64 {
    500
}

fn default_newline_budget() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            debounce_ms: default_debounce_ms(),
            cache_capacity: default_cache_capacity(),
            max_pending_requests: default_max_pending(),
            request_timeout_secs: default_request_timeout_secs(),
            context_window_lines: default_context_window_lines(),
            accept_chain_window_ms: default_accept_chain_window_ms(),
            newline_budget: default_newline_budget(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn accept_chain_window(&self) -> Duration {
        Duration::from_millis(self.accept_chain_window_ms)
    }
}

impl Config {
    /// Load config from the default path (~/.config/ghostline/config.toml).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(format!("{home}/.config/ghostline/config.toml"))
    }
}

//! Engine connection configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, env};

/// How to reach the generation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine address, either `host:port` or a full `http(s)://` URL
    pub api_url: String,
    /// Use https when `api_url` carries no scheme
    pub secure: bool,
    /// Directory where the engine writes outputs, when it is readable locally
    pub output_dir: Option<PathBuf>,
    /// Interval between history polls, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            secure: false,
            output_dir: None,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Build a configuration from `COMFYUI_*` environment variables,
    /// falling back to defaults for anything unset or unparseable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(env::API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(secure) = lookup(env::SECURE) {
            config.secure = secure.trim().eq_ignore_ascii_case("true");
        }
        if let Some(dir) = lookup(env::OUTPUT_DIR).filter(|v| !v.trim().is_empty()) {
            config.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(interval) = lookup(env::POLL_INTERVAL_MS) {
            match interval.trim().parse() {
                Ok(ms) => config.poll_interval_ms = ms,
                Err(_) => log::warn!(
                    "Ignoring invalid {}='{}'",
                    env::POLL_INTERVAL_MS,
                    interval
                ),
            }
        }
        config
    }

    /// Base URL of the engine's HTTP API, without a trailing slash
    pub fn base_url(&self) -> String {
        let url = self.api_url.trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if self.secure {
            format!("https://{}", url)
        } else {
            format!("http://{}", url)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

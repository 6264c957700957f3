//! Runtime settings: `.env`, process environment, an optional TOML file and
//! command-line overrides, resolved into one [`Settings`] value.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::cache::DEFAULT_TTL;
use crate::core::export::DEFAULT_OUTPUT_DIR;
use crate::core::reveal::{PaceConfig, RevealError};
use crate::core::selection::STATE_FILE_NAME;
use crate::mcp::McpSettings;

pub const DEFAULT_MCP_URL: &str = "https://mcp.hackthebox.ai/v1/ctf/mcp/";
pub const URL_ENV: &str = "HTB_MCP_URL";
pub const TOKEN_ENV: &str = "API_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{TOKEN_ENV} not set. Add it to the environment or a .env file.")]
    MissingToken,
    #[error("Invalid MCP server URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Invalid [reveal] settings: {0}")]
    Reveal(#[from] RevealError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub url: Option<String>,
    pub reveal: RevealSettings,
    pub cache: CacheSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealSettings {
    pub enabled: bool,
    pub chars_per_second: f64,
    pub pause_after_sentence_ms: u64,
    pub pause_after_clause_ms: u64,
}

impl Default for RevealSettings {
    fn default() -> Self {
        let pace = PaceConfig::default();
        Self {
            enabled: true,
            chars_per_second: pace.chars_per_second,
            pause_after_sentence_ms: pace.pause_after_sentence.as_millis() as u64,
            pause_after_clause_ms: pace.pause_after_clause.as_millis() as u64,
        }
    }
}

impl RevealSettings {
    pub fn pace(&self) -> PaceConfig {
        PaceConfig {
            chars_per_second: self.chars_per_second,
            pause_after_sentence: Duration::from_millis(self.pause_after_sentence_ms),
            pause_after_clause: Duration::from_millis(self.pause_after_clause_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub state_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("ai", "hackthebox", "htbmcp")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Command-line values that win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub config_path: Option<PathBuf>,
    pub no_animation: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: McpSettings,
    pub pace: PaceConfig,
    pub animate: bool,
    pub cache_ttl: Duration,
    pub state_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Settings {
    /// Loads `.env` (existing process variables win), reads the TOML file and
    /// resolves everything against `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Settings, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => debug!(error = %err, "ignoring unreadable .env"),
        }

        let config_path = overrides.config_path.clone().or_else(Config::default_path);
        let config = match &config_path {
            Some(path) => Config::load_from_path(path)?,
            None => Config::default(),
        };

        Self::resolve(&config, |key| std::env::var(key).ok(), overrides)
    }

    pub fn resolve(
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Settings, ConfigError> {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let url = non_empty(overrides.url.clone())
            .or_else(|| non_empty(env(URL_ENV)))
            .or_else(|| non_empty(config.url.clone()))
            .unwrap_or_else(|| DEFAULT_MCP_URL.to_string());
        if let Err(err) = reqwest::Url::parse(&url) {
            return Err(ConfigError::InvalidUrl {
                url,
                message: err.to_string(),
            });
        }

        let token = non_empty(env(TOKEN_ENV)).ok_or(ConfigError::MissingToken)?;

        let pace = config.reveal.pace();
        pace.validate()?;

        Ok(Settings {
            server: McpSettings { url, token },
            pace,
            animate: config.reveal.enabled && !overrides.no_animation,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            state_file: config
                .paths
                .state_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(STATE_FILE_NAME)),
            output_dir: config
                .paths
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        })
    }
}

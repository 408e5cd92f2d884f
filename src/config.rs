use crate::credentials::CookieSource;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the optional per-directory override file.
pub const LOCAL_CONFIG_FILE: &str = ".birdrc.toml";

pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_QUOTE_DEPTH: usize = 1;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown cookie source '{0}' (expected safari, chrome or firefox)")]
    CookieSource(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cookie_sources: Vec<CookieSource>,
    pub chrome_profile: Option<String>,
    pub firefox_profile: Option<String>,
    pub timeout_ms: u64,
    pub quote_depth: usize,
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie_sources: CookieSource::platform_defaults(),
            chrome_profile: None,
            firefox_profile: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            quote_depth: DEFAULT_QUOTE_DEPTH,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    cookie_source: Option<Vec<String>>,
    chrome_profile: Option<String>,
    firefox_profile: Option<String>,
    timeout_ms: Option<u64>,
    quote_depth: Option<usize>,
    server_port: Option<u16>,
}

impl RawConfig {
    fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(raw))
    }

    /// Fields set in `other` win.
    fn merge(self, other: RawConfig) -> RawConfig {
        RawConfig {
            cookie_source: other.cookie_source.or(self.cookie_source),
            chrome_profile: other.chrome_profile.or(self.chrome_profile),
            firefox_profile: other.firefox_profile.or(self.firefox_profile),
            timeout_ms: other.timeout_ms.or(self.timeout_ms),
            quote_depth: other.quote_depth.or(self.quote_depth),
            server_port: other.server_port.or(self.server_port),
        }
    }
}

/// `~/.config/bird` (or the platform equivalent).
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bird"))
}

impl Config {
    /// Load the global config, then let `.birdrc.toml` in `cwd` override it.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let global = config_dir().map(|dir| dir.join("config.toml"));
        Self::load_from(global.as_deref(), &cwd.join(LOCAL_CONFIG_FILE))
    }

    pub fn load_from(global: Option<&Path>, local: &Path) -> Result<Self, ConfigError> {
        let mut raw = RawConfig::default();
        if let Some(global) = global {
            if let Some(global_raw) = RawConfig::read(global)? {
                raw = raw.merge(global_raw);
            }
        }
        if let Some(local_raw) = RawConfig::read(local)? {
            raw = raw.merge(local_raw);
        }
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let cookie_sources = match raw.cookie_source {
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<CookieSource>()
                        .map_err(|_| ConfigError::CookieSource(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.cookie_sources,
        };

        Ok(Self {
            cookie_sources,
            chrome_profile: raw.chrome_profile,
            firefox_profile: raw.firefox_profile,
            timeout_ms: raw.timeout_ms.unwrap_or(defaults.timeout_ms),
            quote_depth: raw.quote_depth.unwrap_or(defaults.quote_depth),
            server_port: raw.server_port.unwrap_or(defaults.server_port),
        })
    }
}

//! Runtime configuration, read from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/images";
pub const DEFAULT_SEARCH_URL: &str = "https://duckduckgo.com/";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a number of seconds, got '{value}'")]
    InvalidSeconds { key: &'static str, value: String },

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidCount { key: &'static str, value: String },

    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown safesearch level '{0}' (expected on, moderate or off)")]
    InvalidSafeSearch(String),

    #[error("pause range is inverted: min {min:?} > max {max:?}")]
    InvertedPause { min: Duration, max: Duration },
}

/// Safe-search level forwarded to the image search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafeSearch {
    On,
    #[default]
    Moderate,
    Off,
}

impl SafeSearch {
    /// Value of the provider's `p` query parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            SafeSearch::On | SafeSearch::Moderate => "1",
            SafeSearch::Off => "-1",
        }
    }
}

impl FromStr for SafeSearch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(SafeSearch::On),
            "moderate" => Ok(SafeSearch::Moderate),
            "off" => Ok(SafeSearch::Off),
            _ => Err(ConfigError::InvalidSafeSearch(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Folder the images and `updated.csv` are written to. Created on demand.
    pub output_dir: PathBuf,
    /// Per-request timeout for each image download.
    pub download_timeout: Duration,
    /// Per-request timeout for each call to the search provider.
    pub search_timeout: Duration,
    pub pause_min: Duration,
    pub pause_max: Duration,
    pub search_url: Url,
    pub region: String,
    pub safesearch: SafeSearch,
    pub user_agent: String,
    /// How many log lines the UI keeps on screen.
    pub log_tail: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            download_timeout: Duration::from_secs(15),
            search_timeout: Duration::from_secs(15),
            pause_min: Duration::from_secs(1),
            pause_max: Duration::from_secs(3),
            // Constant literal, always parses.
            search_url: Url::parse(DEFAULT_SEARCH_URL).expect("default search URL is valid"),
            region: "wt-wt".to_string(),
            safesearch: SafeSearch::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_tail: 200,
        }
    }
}

impl AppConfig {
    /// Loads `.env` if there is one, then reads `CSVPIX_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("CSVPIX_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir.trim());
        }
        if let Some(v) = lookup("CSVPIX_DOWNLOAD_TIMEOUT_SECS") {
            config.download_timeout = parse_seconds("CSVPIX_DOWNLOAD_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CSVPIX_SEARCH_TIMEOUT_SECS") {
            config.search_timeout = parse_seconds("CSVPIX_SEARCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CSVPIX_PAUSE_MIN_SECS") {
            config.pause_min = parse_seconds("CSVPIX_PAUSE_MIN_SECS", &v)?;
        }
        if let Some(v) = lookup("CSVPIX_PAUSE_MAX_SECS") {
            config.pause_max = parse_seconds("CSVPIX_PAUSE_MAX_SECS", &v)?;
        }
        if let Some(v) = lookup("CSVPIX_SEARCH_URL") {
            config.search_url = Url::parse(v.trim()).map_err(|source| ConfigError::InvalidUrl {
                key: "CSVPIX_SEARCH_URL",
                source,
            })?;
        }
        if let Some(v) = lookup("CSVPIX_REGION").filter(|v| !v.trim().is_empty()) {
            config.region = v.trim().to_string();
        }
        if let Some(v) = lookup("CSVPIX_SAFESEARCH") {
            config.safesearch = v.parse()?;
        }
        if let Some(v) = lookup("CSVPIX_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.user_agent = v;
        }
        if let Some(v) = lookup("CSVPIX_LOG_TAIL") {
            config.log_tail = match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidCount {
                        key: "CSVPIX_LOG_TAIL",
                        value: v,
                    })
                }
            };
        }

        if config.pause_min > config.pause_max {
            return Err(ConfigError::InvertedPause {
                min: config.pause_min,
                max: config.pause_max,
            });
        }
        Ok(config)
    }
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::InvalidSeconds {
            key,
            value: value.to_string(),
        })
}

//! Runtime configuration, read from `AGORA_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use agora_shared::{ParseSortOrderError, SortOrder};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_MAX_CONTENT_LEN: usize = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A configuration value that could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a number: {value:?}")]
    NotANumber { key: &'static str, value: String },

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("AGORA_DEFAULT_SORT: {0}")]
    SortOrder(#[from] ParseSortOrderError),

    #[error("unknown reply counting mode `{0}` (expected event or subtree)")]
    ReplyCounting(String),
}

/// How `reply_count` reacts to a subtree delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyCounting {
    /// One delete event, one decrement, whatever the subtree size.
    #[default]
    PerEvent,
    /// Decrement by every removed node, keeping `reply_count` equal to the
    /// number of reachable replies.
    Subtree,
}

impl FromStr for ReplyCounting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" | "per-event" => Ok(ReplyCounting::PerEvent),
            "subtree" => Ok(ReplyCounting::Subtree),
            other => Err(ConfigError::ReplyCounting(other.to_string())),
        }
    }
}

/// The part of the configuration the in-memory store needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub max_content_len: usize,
    pub reply_counting: ReplyCounting,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
            reply_counting: ReplyCounting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub max_content_len: usize,
    pub default_sort: SortOrder,
    pub reply_counting: ReplyCounting,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
            default_sort: SortOrder::default(),
            reply_counting: ReplyCounting::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let api_url = lookup("AGORA_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let max_content_len = match lookup("AGORA_MAX_CONTENT_LEN") {
            Some(raw) => parse_number::<usize>("AGORA_MAX_CONTENT_LEN", raw)?,
            None => defaults.max_content_len,
        };
        if max_content_len == 0 {
            return Err(ConfigError::NotPositive("AGORA_MAX_CONTENT_LEN"));
        }

        let default_sort = match lookup("AGORA_DEFAULT_SORT") {
            Some(raw) => raw.parse::<SortOrder>()?,
            None => defaults.default_sort,
        };

        let reply_counting = match lookup("AGORA_REPLY_COUNTING") {
            Some(raw) => raw.parse()?,
            None => defaults.reply_counting,
        };

        let request_timeout = match lookup("AGORA_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("AGORA_REQUEST_TIMEOUT_SECS", raw)?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_url,
            max_content_len,
            default_sort,
            reply_counting,
            request_timeout,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_content_len: self.max_content_len,
            reply_counting: self.reply_counting,
        }
    }
}

fn parse_number<T: FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::NotANumber { key, value: raw })
}

//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_API_URL: &str = "https://bk-seva.onrender.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Lifetimes applied when tokens are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh: Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub ttls: TokenTtls,
    /// Persist tokens to this file; in-memory store when `None`.
    pub token_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Config for `base_url` with every other value at its default.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the URL is not absolute http(s).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            timeouts: Timeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            ttls: TokenTtls::default(),
            token_file: None,
        })
    }

    /// Build typed config from environment variables (a `.env` file is loaded first).
    ///
    /// Optional:
    /// - `PROGRESS_API_URL`: default `https://bk-seva.onrender.com`
    /// - `PROGRESS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PROGRESS_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PROGRESS_ACCESS_TOKEN_TTL_SECS`: default 3600
    /// - `PROGRESS_REFRESH_TOKEN_TTL_SECS`: default 604800
    /// - `PROGRESS_TOKEN_FILE`: persist tokens to this path
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL is invalid.
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same parsing as [`ClientConfig::from_env`] over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("PROGRESS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let parse = |key: &str, default: u64| parse_u64(lookup(key).as_deref(), default);

        Ok(Self {
            base_url: normalize_base_url(&base_url)?,
            timeouts: Timeouts {
                request_secs: parse("PROGRESS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: parse("PROGRESS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            ttls: TokenTtls {
                access: Duration::from_secs(parse("PROGRESS_ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS)),
                refresh: Duration::from_secs(parse("PROGRESS_REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TOKEN_TTL_SECS)),
            },
            token_file: lookup("PROGRESS_TOKEN_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Absolute URL for a `/`-prefixed backend path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

fn parse_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed).map_err(|e| ClientError::Config(format!("invalid base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::Config(format!("unsupported base URL scheme '{}'", url.scheme())));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

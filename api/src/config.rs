//! Configuration management for the API client.

use std::env;
use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use crate::error::ConfigError;

/// Environment variable holding the backend base URL.
pub const BASE_URL_VAR: &str = "DOCCHAT_API_BASE_URL";
/// Upload deadline override in milliseconds.
pub const UPLOAD_TIMEOUT_VAR: &str = "DOCCHAT_UPLOAD_TIMEOUT_MS";
/// Chat deadline override in milliseconds.
pub const CHAT_TIMEOUT_VAR: &str = "DOCCHAT_CHAT_TIMEOUT_MS";
/// Deadline override in milliseconds for requests that are neither upload nor chat.
pub const DEFAULT_TIMEOUT_VAR: &str = "DOCCHAT_DEFAULT_TIMEOUT_MS";

/// Document indexing can take minutes on the backend.
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 180_000;
/// Chat deadline when `DOCCHAT_CHAT_TIMEOUT_MS` is unset or invalid.
pub const DEFAULT_CHAT_TIMEOUT_MS: u64 = 25_000;
/// Deadline for other requests when `DOCCHAT_DEFAULT_TIMEOUT_MS` is unset or invalid.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 25_000;

/// Client configuration, resolved once and immutable afterwards.
///
/// A missing or invalid base URL does not fail construction. It is kept as the
/// error that every operation reports before attempting any I/O.
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalized base URL, or the reason it is unusable
    base_url: std::result::Result<String, ConfigError>,
    /// Deadline for document uploads
    pub upload_timeout: Duration,
    /// Deadline for chat queries
    pub chat_timeout: Duration,
    /// Deadline for any other request
    pub default_timeout: Duration,
}

impl Config {
    /// Build a configuration from an explicit base URL with default timeouts.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::from_raw(Some(base_url.as_ref()))
    }

    /// Build a configuration with no base URL; every operation reports `CONFIG_ERROR`.
    pub fn unconfigured() -> Self {
        Self::from_raw(None)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let raw = env::var(BASE_URL_VAR).ok();
        let mut config = Self::from_raw(raw.as_deref());
        config.upload_timeout = timeout_from_env(UPLOAD_TIMEOUT_VAR, DEFAULT_UPLOAD_TIMEOUT_MS);
        config.chat_timeout = timeout_from_env(CHAT_TIMEOUT_VAR, DEFAULT_CHAT_TIMEOUT_MS);
        config.default_timeout = timeout_from_env(DEFAULT_TIMEOUT_VAR, DEFAULT_REQUEST_TIMEOUT_MS);
        config
    }

    fn from_raw(raw: Option<&str>) -> Self {
        Self {
            base_url: resolve_base_url(raw),
            upload_timeout: Duration::from_millis(DEFAULT_UPLOAD_TIMEOUT_MS),
            chat_timeout: Duration::from_millis(DEFAULT_CHAT_TIMEOUT_MS),
            default_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_chat_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The normalized base URL, checked on every operation.
    pub fn base_url(&self) -> std::result::Result<&str, ConfigError> {
        self.base_url.as_deref().map_err(Clone::clone)
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_ok()
    }
}

/// Trim whitespace and trailing slashes from a raw base URL.
pub fn resolve_base_url(raw: Option<&str>) -> std::result::Result<String, ConfigError> {
    let trimmed = raw.unwrap_or_default().trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::MissingBaseUrl { var: BASE_URL_VAR });
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.to_string())
        }
        _ => Err(ConfigError::InvalidBaseUrl {
            var: BASE_URL_VAR,
            value: trimmed.to_string(),
        }),
    }
}

fn timeout_from_env(var: &str, default_ms: u64) -> Duration {
    let millis = match env::var(var) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                warn!("Ignoring invalid {}={:?}, using {}ms", var, value, default_ms);
                default_ms
            }
        },
        Err(_) => default_ms,
    };
    Duration::from_millis(millis)
}

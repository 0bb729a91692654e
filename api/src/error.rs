//! Error types and normalization for the API client.
//!
//! Every failure path (configuration, transport, deadline, backend rejection) is
//! converted by [`normalize`] into a single [`ApiError`] before reaching callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::ErrorEnvelope;

/// Result type alias using our normalized error.
pub type Result<T> = std::result::Result<T, ApiError>;

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const TIMEOUT: &str = "TIMEOUT";
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const BACKEND_ERROR: &str = "BACKEND_ERROR";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
const NETWORK_MESSAGE: &str = "Could not reach backend API.";
const DECODE_MESSAGE: &str = "Backend returned an unexpected response shape.";
const UNKNOWN_MESSAGE: &str = "Unexpected error. Please try again.";

/// Configuration errors detected before any request is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Base URL unset or blank
    #[error("{var} is missing. Set it to the backend base URL (for example https://host:port).")]
    MissingBaseUrl { var: &'static str },

    /// Base URL is not an absolute http(s) URL
    #[error("{var} is not a valid http(s) URL: {value:?}")]
    InvalidBaseUrl { var: &'static str, value: String },
}

/// The normalized error shape every failure converges to.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Correlation id; empty when none was supplied
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Broad classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Timeout,
    Network,
    Backend,
    Unknown,
}

impl ErrorKind {
    /// Whether the same request may succeed if the user simply tries again.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Network)
    }
}

impl ApiError {
    /// Build an error, substituting defaults for blank code or message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        Self {
            code: if code.trim().is_empty() { UNKNOWN_ERROR.to_string() } else { code },
            message: if message.trim().is_empty() { UNKNOWN_MESSAGE.to_string() } else { message },
            request_id: String::new(),
            status: None,
            details: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Fallback for failures that fit no other category.
    pub fn unknown(detail: impl Into<String>) -> Self {
        normalize(Failure::Unknown(detail.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code.as_str() {
            CONFIG_ERROR => ErrorKind::Config,
            TIMEOUT => ErrorKind::Timeout,
            NETWORK_ERROR => ErrorKind::Network,
            UNKNOWN_ERROR => ErrorKind::Unknown,
            // Backend-supplied codes are passed through verbatim.
            _ => ErrorKind::Backend,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &str {
        &self.message
    }
}

impl From<ConfigError> for ApiError {
    fn from(error: ConfigError) -> Self {
        normalize(Failure::Config(error))
    }
}

/// Raw outcome of a failed request, before normalization.
#[derive(Debug)]
pub enum Failure {
    /// Configuration unusable; no request was attempted
    Config(ConfigError),
    /// The executor's own deadline elapsed
    Timeout,
    /// Connection refused, DNS failure, TLS failure and the like
    Network(String),
    /// Non-2xx response
    Http {
        status: u16,
        body: Option<Value>,
        header_request_id: String,
    },
    /// 2xx response whose data does not match the expected result type
    Decode {
        status: u16,
        request_id: String,
        reason: String,
    },
    Unknown(String),
}

/// Convert a raw failure into the normalized error shape.
///
/// Total: never panics and always yields a non-empty code and message.
pub fn normalize(failure: Failure) -> ApiError {
    match failure {
        Failure::Config(error) => ApiError::new(CONFIG_ERROR, error.to_string()).with_status(500),
        Failure::Timeout => ApiError::new(TIMEOUT, TIMEOUT_MESSAGE).with_status(408),
        Failure::Network(detail) => ApiError::new(NETWORK_ERROR, NETWORK_MESSAGE)
            .with_status(0)
            .with_details(Value::String(detail)),
        Failure::Http {
            status,
            body,
            header_request_id,
        } => normalize_http(status, body, header_request_id),
        Failure::Decode {
            status,
            request_id,
            reason,
        } => ApiError::new(BACKEND_ERROR, DECODE_MESSAGE)
            .with_status(status)
            .with_request_id(request_id)
            .with_details(Value::String(reason)),
        Failure::Unknown(detail) => {
            let error = ApiError::new(UNKNOWN_ERROR, UNKNOWN_MESSAGE);
            if detail.is_empty() {
                error
            } else {
                error.with_details(Value::String(detail))
            }
        }
    }
}

fn normalize_http(status: u16, body: Option<Value>, header_request_id: String) -> ApiError {
    let envelope = body.and_then(|value| serde_json::from_value::<ErrorEnvelope>(value).ok());

    if let Some(envelope) = envelope.filter(|e| !e.success) {
        if let Some(message) = envelope.error.message() {
            let code = envelope.error.code().unwrap_or(BACKEND_ERROR);
            let request_id = envelope.request_id().unwrap_or(header_request_id.as_str());
            let mut error = ApiError::new(code, message)
                .with_status(status)
                .with_request_id(request_id);
            error.details = envelope.error.details;
            return error;
        }
    }

    ApiError::new(BACKEND_ERROR, format!("Request failed with status {}.", status))
        .with_status(status)
        .with_request_id(header_request_id)
}

//! Client error type shared by every module.
//!
//! ERROR HANDLING
//! ==============
//! Auth, validation and network failures are the three kinds Screens react
//! to. The remaining variants cover the ambient plumbing (config, decoding,
//! token persistence) and surface through the same enum so callers only ever
//! match on one type.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Credentials rejected, refresh token missing/expired, or refresh failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Backend rejected the submitted input (e.g. duplicate email).
    #[error("validation failed: {0}")]
    Validation(String),

    /// No response was received.
    #[error("request failed: {0}")]
    Network(String),

    /// A typed helper received a non-success status.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("token store failed: {0}")]
    Store(#[from] StoreError),

    #[error("config parse failed: {0}")]
    Config(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ClientError {
    /// Stable code for structured logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "E_AUTH",
            Self::Validation(_) => "E_VALIDATION",
            Self::Network(_) => "E_NETWORK",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
            Self::Store(_) => "E_STORE",
            Self::Config(_) => "E_CONFIG",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// True when the caller should fall back to the sign-in screen.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Status { status: 401, .. })
    }

    /// Human-readable reason without the variant prefix.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Auth(msg) | Self::Validation(msg) | Self::Network(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

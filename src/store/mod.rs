//! Token store — access/refresh token persistence with per-token expiry.
//!
//! DESIGN
//! ======
//! Values are opaque; nothing here inspects token contents. Expiry is
//! checked at read time, so an expired token simply reads as absent.
//! `set_session` writes both tokens under one lock so a concurrent reader
//! never sees a new access token paired with a stale refresh token.

pub mod file;
pub mod memory;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    pub const ALL: [Self; 2] = [Self::AccessToken, Self::RefreshToken];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// A token value with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl StoredToken {
    #[must_use]
    pub fn new(value: String, ttl: Duration) -> Self {
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX))
            .unwrap_or(OffsetDateTime::new_utc(time::Date::MAX, time::Time::MIDNIGHT));
        Self { value, expires_at }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token file I/O failed: {0}")]
    Io(String),
    #[error("token file is not valid JSON: {0}")]
    Serialize(String),
}

/// Storage for the two session tokens.
pub trait TokenStore: Send + Sync {
    /// Current value, or `None` when never set, cleared, or expired.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be read.
    fn get(&self, kind: TokenKind) -> Result<Option<String>, StoreError>;

    /// Store `value`; it reads as absent once `ttl` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be written.
    fn set(&self, kind: TokenKind, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be written.
    fn clear(&self, kind: TokenKind) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be written.
    fn clear_all(&self) -> Result<(), StoreError>;

    /// Replace both tokens in one step.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be written.
    fn set_session(
        &self,
        access: &str,
        refresh: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

//! In-process token store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use super::{StoreError, StoredToken, TokenKind, TokenStore};

/// Token store kept in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<TokenKind, StoredToken>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<String>, StoreError> {
        let tokens = self.tokens.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(tokens
            .get(&kind)
            .filter(|token| !token.is_expired())
            .map(|token| token.value.clone()))
    }

    fn set(&self, kind: TokenKind, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tokens.insert(kind, StoredToken::new(value.to_string(), ttl));
        Ok(())
    }

    fn clear(&self, kind: TokenKind) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tokens.remove(&kind);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tokens.clear();
        Ok(())
    }

    fn set_session(
        &self,
        access: &str,
        refresh: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tokens.insert(TokenKind::AccessToken, StoredToken::new(access.to_string(), access_ttl));
        tokens.insert(TokenKind::RefreshToken, StoredToken::new(refresh.to_string(), refresh_ttl));
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

//! File-backed token store.
//!
//! Tokens are kept in a JSON map (`{"access_token": {...}, "refresh_token": {...}}`)
//! written with restricted permissions (0600) on unix. The file is read once
//! on open and atomically replaced (temp file + rename) on every mutation,
//! so tokens survive restarts until their expiry.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::{StoreError, StoredToken, TokenKind, TokenStore};

type TokenMap = HashMap<TokenKind, StoredToken>;

#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<TokenMap>,
}

impl FileTokenStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tokens = load(&path)?;
        tracing::debug!(path = %path.display(), entries = tokens.len(), "token file opened");
        Ok(Self { path, tokens: Mutex::new(tokens) })
    }

    fn mutate<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut TokenMap),
    {
        let mut tokens = self.tokens.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        apply(&mut tokens);
        tokens.retain(|_, token| !token.is_expired());
        save(&self.path, &tokens)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<String>, StoreError> {
        let tokens = self.tokens.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(tokens
            .get(&kind)
            .filter(|token| !token.is_expired())
            .map(|token| token.value.clone()))
    }

    fn set(&self, kind: TokenKind, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.mutate(|tokens| {
            tokens.insert(kind, StoredToken::new(value.to_string(), ttl));
        })?;
        tracing::debug!(kind = kind.as_str(), ttl_secs = ttl.as_secs(), "token persisted");
        Ok(())
    }

    fn clear(&self, kind: TokenKind) -> Result<(), StoreError> {
        self.mutate(|tokens| {
            tokens.remove(&kind);
        })?;
        tracing::debug!(kind = kind.as_str(), "token cleared");
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.mutate(HashMap::clear)
    }

    fn set_session(
        &self,
        access: &str,
        refresh: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<(), StoreError> {
        self.mutate(|tokens| {
            tokens.insert(TokenKind::AccessToken, StoredToken::new(access.to_string(), access_ttl));
            tokens.insert(TokenKind::RefreshToken, StoredToken::new(refresh.to_string(), refresh_ttl));
        })
    }
}

fn load(path: &Path) -> Result<TokenMap, StoreError> {
    if !path.exists() {
        return Ok(TokenMap::new());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("failed to read {}: {e}", path.display())))?;
    if contents.trim().is_empty() {
        return Ok(TokenMap::new());
    }
    serde_json::from_str(&contents).map_err(|e| StoreError::Serialize(format!("{}: {e}", path.display())))
}

fn save(path: &Path, tokens: &TokenMap) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("failed to create {}: {e}", parent.display())))?;
        }
    }

    let contents = serde_json::to_string_pretty(tokens).map_err(|e| StoreError::Serialize(e.to_string()))?;

    // Write a sibling temp file and rename it over the target, so a failed
    // write never leaves a truncated token file behind.
    let tmp_path = sibling_temp_path(path);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&tmp_path)
        .map_err(|e| StoreError::Io(format!("failed to open {} for writing: {e}", tmp_path.display())))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::Io(format!("failed to write {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        StoreError::Io(format!("failed to rename {} to {}: {e}", tmp_path.display(), path.display()))
    })
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

//! API client — bearer injection and the single refresh-and-retry contract.
//!
//! DESIGN
//! ======
//! Every outbound call reads the access token from the store and attaches
//! it as `Authorization: Bearer`. A 401 on a request that has not been
//! retried triggers exactly one refresh through `/refresh`, then exactly one
//! resend with the new token. The `retried` flag lives on `PendingRequest`,
//! so a second 401 can never loop.
//!
//! When the session cannot be recovered (no refresh token, refresh rejected,
//! or 401 again after the retry) both tokens are cleared and the
//! invalidation counter is bumped; `SessionManager` watches that counter
//! and drops to `Anonymous`.
//!
//! TRADE-OFFS
//! ==========
//! Concurrent requests that hit an expired token each run their own
//! refresh. There is no in-flight de-duplication; the backend refresh is a
//! cheap, idempotent mint of a new access token.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{ClientConfig, TokenTtls};
use crate::error::ClientError;
use crate::store::{FileTokenStore, MemoryTokenStore, TokenKind, TokenStore};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::{RefreshRequest, RefreshResponse};

pub const REFRESH_PATH: &str = "/refresh";
pub const NO_REFRESH_TOKEN: &str = "no refresh token";
pub const REFRESH_FAILED: &str = "refresh failed";
pub const UNAUTHORIZED_AFTER_REFRESH: &str = "unauthorized after token refresh";

const STATUS_UNAUTHORIZED: u16 = 401;

/// A request travelling through the retry protocol.
#[derive(Debug, Clone)]
struct PendingRequest {
    request: ApiRequest,
    retried: bool,
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    ttls: TokenTtls,
    invalidations: watch::Sender<u64>,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>, ttls: TokenTtls) -> Self {
        let (invalidations, _) = watch::channel(0);
        Self { transport, store, ttls, invalidations }
    }

    /// Build a `reqwest`-backed client, persisting tokens to `config.token_file` when set.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the token file cannot be opened.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let store: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStore::open(path.clone())?),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let ttls = config.ttls;
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(transport, store, ttls))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    #[must_use]
    pub fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    /// Number of invalidations published so far.
    #[must_use]
    pub fn invalidation_generation(&self) -> u64 {
        *self.invalidations.borrow()
    }

    /// Receiver whose value increments each time the session is invalidated.
    #[must_use]
    pub fn invalidations(&self) -> watch::Receiver<u64> {
        self.invalidations.subscribe()
    }

    /// Send an authenticated request.
    ///
    /// Statuses other than 401 are passed through unchanged; callers decide
    /// what a 404 or 500 means.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Network`] when no response arrives (never retried).
    /// - [`ClientError::Auth`] when a 401 cannot be resolved by one refresh.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ClientError> {
        let mut pending = PendingRequest { request: ApiRequest::new(method, path, body), retried: false };
        let mut bearer = self.store.get(TokenKind::AccessToken)?;

        loop {
            let response = self.transport.send(&pending.request, bearer.as_deref()).await?;
            if response.status != STATUS_UNAUTHORIZED {
                return Ok(response);
            }

            if pending.retried {
                warn!(path = %pending.request.path, "request rejected again after token refresh");
                self.invalidate_session()?;
                return Err(ClientError::Auth(UNAUTHORIZED_AFTER_REFRESH.into()));
            }

            info!(path = %pending.request.path, "access token rejected; refreshing");
            bearer = Some(self.refresh_access_token().await?);
            pending.retried = true;
        }
    }

    /// Send a request without a bearer token and outside the retry contract.
    /// Used for `/login`, `/register` and `/refresh`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] when no response arrives.
    pub async fn send_anonymous(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ClientError> {
        self.transport.send(&ApiRequest::new(method, path, body), None).await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the new access token is stored with the access TTL and
    /// returned. On any failure both tokens are cleared and the session is
    /// invalidated.
    ///
    /// # Errors
    ///
    /// Returns `Auth("no refresh token")` or `Auth("refresh failed")`.
    pub async fn refresh_access_token(&self) -> Result<String, ClientError> {
        let Some(refresh_token) = self.store.get(TokenKind::RefreshToken)? else {
            warn!("no refresh token stored");
            self.invalidate_session()?;
            return Err(ClientError::Auth(NO_REFRESH_TOKEN.into()));
        };

        let body = encode(&RefreshRequest { refresh_token: &refresh_token })?;
        let outcome = match self.send_anonymous(Method::POST, REFRESH_PATH, Some(body)).await {
            Ok(response) if response.is_success() => response
                .json::<RefreshResponse>()
                .map(|r| r.access_token),
            Ok(response) => Err(ClientError::Status { status: response.status, body: response.body }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(access_token) => {
                self.store
                    .set(TokenKind::AccessToken, &access_token, self.ttls.access)?;
                info!("access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "token refresh failed");
                self.invalidate_session()?;
                Err(ClientError::Auth(REFRESH_FAILED.into()))
            }
        }
    }

    /// Clear both tokens and notify session observers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the store cannot be cleared; observers
    /// are notified regardless.
    pub fn invalidate_session(&self) -> Result<(), ClientError> {
        let cleared = self.store.clear_all();
        self.invalidations.send_modify(|generation| *generation += 1);
        warn!("session invalidated; tokens cleared");
        cleared.map_err(ClientError::from)
    }

    // =========================================================================
    // TYPED HELPERS
    // =========================================================================

    /// # Errors
    ///
    /// Any [`ApiClient::request`] error, [`ClientError::Status`] on a non-2xx
    /// response, or [`ClientError::Decode`] on an unexpected body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request(Method::GET, path, None).await?;
        expect_success(response)?.json()
    }

    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, path, Some(encode(body)?)).await?;
        expect_success(response)?.json()
    }

    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::PUT, path, Some(encode(body)?)).await?;
        expect_success(response)?.json()
    }

    /// # Errors
    ///
    /// Any [`ApiClient::request`] error or [`ClientError::Status`] on a non-2xx response.
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let response = self.request(Method::DELETE, path, None).await?;
        expect_success(response).map(|_| ())
    }
}

pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ClientError> {
    serde_json::to_value(body).map_err(|e| ClientError::Decode(format!("request body: {e}")))
}

fn expect_success(response: ApiResponse) -> Result<ApiResponse, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status { status: response.status, body: response.body })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

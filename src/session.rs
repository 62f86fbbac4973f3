//! Session manager — the authoritative "who is logged in".
//!
//! ARCHITECTURE
//! ============
//! `Unknown` (before the startup check) moves to `Anonymous` or
//! `Authenticated(User)`. Login and register enter `Authenticated`; logout,
//! a failed refresh, or an invalidation published by `ApiClient` return to
//! `Anonymous`. The state lives in a `watch` channel so Screens can either
//! read it or subscribe to transitions.
//!
//! The manager is built once and shared by `Arc`; there is no global.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Method;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, REFRESH_FAILED, encode};
use crate::error::ClientError;
use crate::store::TokenKind;
use crate::types::{LoginRequest, LoginResponse, RegisterRequest, User, error_detail};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const PROFILE_PATH: &str = "/profile";
pub const INVALIDATED_DURING_LOGIN: &str = "session invalidated during login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Anonymous,
    Authenticated(User),
}

impl SessionState {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Unknown | Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

pub struct SessionManager {
    client: Arc<ApiClient>,
    state: watch::Sender<SessionState>,
    /// Highest invalidation generation already applied to `state`.
    seen_invalidation: AtomicU64,
}

impl SessionManager {
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        let seen_invalidation = AtomicU64::new(client.invalidation_generation());
        Self { client, state, seen_invalidation }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Current state, after applying any invalidation the client published.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.observe_invalidation();
        self.state.borrow().clone()
    }

    /// Read-only view of the cached profile.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state().user().cloned()
    }

    /// True until the startup check has run.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.state(), SessionState::Unknown)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Push `Anonymous` to subscribers as soon as the client invalidates the
    /// session, instead of waiting for the next `state()` read. The task
    /// ends when the manager is dropped.
    pub fn spawn_invalidation_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let mut invalidations = self.client.invalidations();
        tokio::spawn(async move {
            while invalidations.changed().await.is_ok() {
                let Some(manager) = manager.upgrade() else { break };
                manager.observe_invalidation();
            }
        })
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Startup check: `Unknown` becomes `Authenticated` when a stored access
    /// token yields a profile (directly or after one refresh), `Anonymous`
    /// otherwise.
    pub async fn initialize(&self) -> SessionState {
        let has_access_token = match self.client.store().get(TokenKind::AccessToken) {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "token store unreadable; starting anonymous");
                false
            }
        };

        if !has_access_token {
            debug!("no access token; starting anonymous");
            self.transition(SessionState::Anonymous);
            return self.state();
        }

        let generation = self.client.invalidation_generation();
        match self.fetch_profile().await {
            Ok(user) => {
                if let Err(e) = self.authenticate(user, generation) {
                    debug!(error = %e, "startup session invalidated");
                }
            }
            Err(e) => {
                debug!(code = e.error_code(), error = %e, "profile fetch failed; trying refresh");
                if let Err(e) = self.refresh().await {
                    debug!(error = %e, "startup refresh failed");
                }
            }
        }
        self.state()
    }

    /// Log in with an email or username.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Auth`] with the backend's reason when credentials are rejected,
    ///   or when the client invalidated the new tokens before the profile arrived.
    /// - [`ClientError::Network`] when the backend is unreachable.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, ClientError> {
        let body = encode(&LoginRequest { email_or_username: identifier, password })?;
        let response = self.client.send_anonymous(Method::POST, LOGIN_PATH, Some(body)).await?;
        if !response.is_success() {
            let reason = error_detail(&response.body).unwrap_or_else(|| "Login failed".to_string());
            warn!(status = response.status, "login rejected");
            return Err(ClientError::Auth(reason));
        }

        let tokens: LoginResponse = response.json()?;
        let generation = self.client.invalidation_generation();
        let ttls = self.client.ttls();
        self.client
            .store()
            .set_session(&tokens.access_token, &tokens.refresh_token, ttls.access, ttls.refresh)?;

        match self.fetch_profile().await {
            Ok(user) => {
                self.authenticate(user.clone(), generation)?;
                info!(user_id = %user.id, role = ?user.role, "logged in");
                Ok(user)
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "profile fetch after login failed");
                self.clear_local_session();
                Err(e)
            }
        }
    }

    /// Register, then log in with the same email and password.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Validation`] when the backend rejects the input (400/409/422).
    /// - [`ClientError::Auth`] for other rejections or a failed follow-up login.
    /// - [`ClientError::Network`] when the backend is unreachable.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
        full_name: &str,
    ) -> Result<User, ClientError> {
        let body = encode(&RegisterRequest { email, username, password, full_name })?;
        let response = self.client.send_anonymous(Method::POST, REGISTER_PATH, Some(body)).await?;
        if !response.is_success() {
            let reason = error_detail(&response.body).unwrap_or_else(|| "Registration failed".to_string());
            warn!(status = response.status, "registration rejected");
            return Err(match response.status {
                400 | 409 | 422 => ClientError::Validation(reason),
                _ => ClientError::Auth(reason),
            });
        }

        info!(%username, "registered; logging in");
        self.login(email, password).await
    }

    /// Drop the session locally. Tokens are always cleared; subscribers are
    /// only notified when the state actually changes.
    pub fn logout(&self) {
        let was_anonymous = matches!(self.state(), SessionState::Anonymous);
        self.clear_local_session();
        if !was_anonymous {
            info!("logged out");
        }
    }

    /// Mint a new access token and re-fetch the profile.
    ///
    /// # Errors
    ///
    /// Returns `Auth("no refresh token")` or `Auth("refresh failed")`; in
    /// both cases tokens are cleared and the state becomes `Anonymous`.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let generation = self.client.invalidation_generation();
        if let Err(e) = self.client.refresh_access_token().await {
            self.transition(SessionState::Anonymous);
            return Err(e);
        }

        match self.fetch_profile().await {
            Ok(user) => self.authenticate(user, generation),
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "profile fetch after refresh failed");
                self.clear_local_session();
                Err(ClientError::Auth(REFRESH_FAILED.into()))
            }
        }
    }

    /// The cached user, if it is an admin.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] when anonymous or not an admin.
    pub fn require_admin(&self) -> Result<User, ClientError> {
        match self.user() {
            Some(user) if user.is_admin() => Ok(user),
            Some(_) => Err(ClientError::Auth("admin access required".into())),
            None => Err(ClientError::Auth("not logged in".into())),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn fetch_profile(&self) -> Result<User, ClientError> {
        self.client.get_json::<User>(PROFILE_PATH).await
    }

    /// Enter `Authenticated` unless the client invalidated the session after
    /// `generation` was read. Invalidations up to `generation` belong to the
    /// previous session.
    fn authenticate(&self, user: User, generation: u64) -> Result<(), ClientError> {
        if self.client.invalidation_generation() != generation {
            warn!(user_id = %user.id, "session invalidated while authenticating");
            self.clear_local_session();
            self.observe_invalidation();
            return Err(ClientError::Auth(INVALIDATED_DURING_LOGIN.into()));
        }
        self.seen_invalidation.fetch_max(generation, Ordering::SeqCst);
        self.transition(SessionState::Authenticated(user));
        Ok(())
    }

    fn clear_local_session(&self) {
        if let Err(e) = self.client.store().clear_all() {
            warn!(error = %e, "failed to clear token store");
        }
        self.transition(SessionState::Anonymous);
    }

    fn observe_invalidation(&self) {
        let current = self.client.invalidation_generation();
        if self.seen_invalidation.fetch_max(current, Ordering::SeqCst) >= current {
            return;
        }

        if self.transition(SessionState::Anonymous) {
            info!("session invalidated by client; now anonymous");
        }
    }

    fn transition(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

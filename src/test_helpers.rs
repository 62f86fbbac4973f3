//! Scripted in-process backend for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use crate::client::ApiClient;
use crate::config::TokenTtls;
use crate::error::ClientError;
use crate::store::MemoryTokenStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{Role, User};

/// One request as seen by the backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct BackendState {
    accounts: Vec<Account>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    minted: u64,
    /// Fixed (status, body) for paths that bypass the default handler.
    routes: HashMap<String, (u16, String)>,
    /// Paths that always answer 401, even to valid tokens.
    always_unauthorized: HashSet<String>,
    calls: Vec<RecordedCall>,
}

/// Fake of the auth backend: `/login`, `/register`, `/refresh`, `/profile`,
/// plus any protected path (200 with a valid bearer, 401 otherwise).
pub struct FakeBackend {
    state: Mutex<BackendState>,
    network_down: AtomicBool,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(BackendState::default()), network_down: AtomicBool::new(false) })
    }

    pub fn add_account(&self, email: &str, username: &str, password: &str, role: Role) -> User {
        let mut state = self.state.lock().unwrap();
        let user = make_user(&format!("u{}", state.accounts.len() + 1), email, username, role);
        state.accounts.push(Account { password: password.to_owned(), user: user.clone() });
        user
    }

    /// Answer `path` with a fixed status/body for authenticated callers.
    pub fn set_route(&self, path: &str, status: u16, body: serde_json::Value) {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(path.to_owned(), (status, body.to_string()));
    }

    pub fn always_unauthorized(&self, path: &str) {
        self.state.lock().unwrap().always_unauthorized.insert(path.to_owned());
    }

    /// Simulate natural access-token expiry on the server side.
    pub fn expire_access_tokens(&self) {
        self.state.lock().unwrap().access_tokens.clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.state.lock().unwrap().refresh_tokens.clear();
    }

    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| c.path == path).count()
    }

    /// Mint a token pair for `user_id` as if the user had logged in.
    pub fn issue_tokens(&self, user_id: &str) -> (String, String) {
        let mut state = self.state.lock().unwrap();
        let access = mint(&mut state, "access", user_id);
        let refresh = mint(&mut state, "refresh", user_id);
        state.refresh_tokens.insert(refresh.clone(), user_id.to_owned());
        (access, refresh)
    }

    fn handle(&self, request: &ApiRequest, bearer: Option<&str>) -> ApiResponse {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method: request.method.clone(),
            path: request.path.clone(),
            bearer: bearer.map(str::to_owned),
            body: request.body.clone(),
        });

        let body = request.body.clone().unwrap_or(serde_json::Value::Null);
        let field = |name: &str| body.get(name).and_then(serde_json::Value::as_str).unwrap_or_default().to_owned();

        match request.path.as_str() {
            "/login" => {
                let ident = field("email_or_username");
                let password = field("password");
                let Some(user_id) = state
                    .accounts
                    .iter()
                    .find(|a| (a.user.email == ident || a.user.username == ident) && a.password == password)
                    .map(|a| a.user.id.clone())
                else {
                    return json_response(401, &json!({ "detail": "Invalid credentials" }));
                };
                let access = mint(&mut state, "access", &user_id);
                let refresh = mint(&mut state, "refresh", &user_id);
                state.refresh_tokens.insert(refresh.clone(), user_id);
                json_response(200, &json!({ "access_token": access, "refresh_token": refresh, "token_type": "bearer" }))
            }
            "/register" => {
                let email = field("email");
                let username = field("username");
                if email.is_empty() || !email.contains('@') {
                    return json_response(
                        422,
                        &json!({ "detail": [{ "loc": ["body", "email"], "msg": "value is not a valid email address" }] }),
                    );
                }
                if state.accounts.iter().any(|a| a.user.email == email) {
                    return json_response(400, &json!({ "detail": "Email already registered" }));
                }
                if state.accounts.iter().any(|a| a.user.username == username) {
                    return json_response(400, &json!({ "detail": "Username already taken" }));
                }
                let mut user = make_user(&format!("u{}", state.accounts.len() + 1), &email, &username, Role::User);
                user.full_name = field("full_name");
                state.accounts.push(Account { password: field("password"), user });
                json_response(201, &json!({ "message": "User registered successfully" }))
            }
            "/refresh" => {
                let token = field("refresh_token");
                let Some(user_id) = state.refresh_tokens.get(&token).cloned() else {
                    return json_response(401, &json!({ "detail": "Invalid refresh token" }));
                };
                let access = mint(&mut state, "access", &user_id);
                json_response(200, &json!({ "access_token": access, "token_type": "bearer" }))
            }
            path => {
                if state.always_unauthorized.contains(path) {
                    return json_response(401, &json!({ "detail": "Not authenticated" }));
                }
                let Some(user_id) = bearer.and_then(|b| state.access_tokens.get(b)).cloned() else {
                    return json_response(401, &json!({ "detail": "Could not validate credentials" }));
                };
                if let Some((status, body)) = state.routes.get(path) {
                    return ApiResponse::new(*status, body.clone());
                }
                if path == "/profile" {
                    let user = state.accounts.iter().find(|a| a.user.id == user_id).map(|a| a.user.clone());
                    return match user {
                        Some(user) => json_response(200, &serde_json::to_value(user).unwrap()),
                        None => json_response(404, &json!({ "detail": "User not found" })),
                    };
                }
                json_response(200, &json!({ "path": path, "user_id": user_id }))
            }
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, ClientError> {
        // Suspend once so concurrent callers interleave like real I/O.
        tokio::task::yield_now().await;
        if self.network_down.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".into()));
        }
        Ok(self.handle(request, bearer))
    }
}

fn mint(state: &mut BackendState, prefix: &str, user_id: &str) -> String {
    state.minted += 1;
    let token = format!("{prefix}-{}", state.minted);
    if prefix == "access" {
        state.access_tokens.insert(token.clone(), user_id.to_owned());
    }
    token
}

fn json_response(status: u16, body: &serde_json::Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}

#[must_use]
pub fn make_user(id: &str, email: &str, username: &str, role: Role) -> User {
    User {
        id: id.to_owned(),
        email: email.to_owned(),
        username: username.to_owned(),
        full_name: format!("{username} Example"),
        role,
        is_active: true,
        created_at: "2025-01-01T00:00:00".to_owned(),
    }
}

/// `ApiClient` wired to `backend` with an in-memory store and default TTLs.
#[must_use]
pub fn client_for(backend: &Arc<FakeBackend>) -> ApiClient {
    ApiClient::new(backend.clone(), Arc::new(MemoryTokenStore::new()), TokenTtls::default())
}

//! Wire types for the backend auth endpoints.

use serde::{Deserialize, Serialize};

// =============================================================================
// USER
// =============================================================================

/// Server-assigned role. Anything other than `"admin"` is a standard user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(other)]
    User,
}

/// Profile returned by `GET /profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
}

fn default_active() -> bool {
    true
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// =============================================================================
// REQUEST / RESPONSE BODIES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email_or_username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Only the access token rotates on refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

// =============================================================================
// ERROR DETAIL
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Extract the human-readable reason from a `{"detail": ...}` error body.
///
/// `detail` is either a string or a list of `{loc, msg}` validation items.
#[must_use]
pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Array(items) => {
            let messages: Vec<String> = items.iter().filter_map(validation_item_message).collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn validation_item_message(item: &serde_json::Value) -> Option<String> {
    let msg = item.get("msg").and_then(serde_json::Value::as_str)?;
    let field = item
        .get("loc")
        .and_then(serde_json::Value::as_array)
        .and_then(|loc| loc.last())
        .and_then(serde_json::Value::as_str);
    Some(match field {
        Some(field) => format!("{field}: {msg}"),
        None => msg.to_string(),
    })
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

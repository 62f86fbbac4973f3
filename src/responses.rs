//! Admin response views — one canonical shape from two backend payloads.
//!
//! DESIGN
//! ======
//! The responses endpoint returns either enriched rows (user details and
//! question text already joined) or legacy rows (bare `answers` keyed by
//! question id). Both decode into `ResponsePayload` and are normalized to
//! `ResponseView`. Legacy rows are completed from the admin user list and
//! the form definition; only then are those two extra endpoints fetched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::session::SessionManager;
use crate::types::User;

pub const UNKNOWN_USER: &str = "Unknown User";
pub const UNKNOWN_EMAIL: &str = "Unknown Email";
pub const UNKNOWN_USERNAME: &str = "Unknown Username";
pub const DEFAULT_QUESTION_TYPE: &str = "text";

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub created_at: String,
}

impl Form {
    #[must_use]
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

// =============================================================================
// ANSWERS
// =============================================================================

/// A free-text answer or a multi-select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => f.write_str(value),
            Self::Multiple(values) => f.write_str(&values.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub answer: AnswerValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question_id: String,
    pub question_text: String,
    pub question_type: String,
    pub answer: AnswerValue,
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnrichedResponse {
    #[serde(alias = "id")]
    pub response_id: Option<String>,
    pub form_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_username: Option<String>,
    #[serde(default)]
    pub submitted_at: String,
    pub question_answers: Vec<QuestionAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyResponse {
    #[serde(alias = "response_id")]
    pub id: Option<String>,
    pub form_id: String,
    pub user_id: String,
    #[serde(default)]
    pub submitted_at: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// Either response shape the backend may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Enriched(EnrichedResponse),
    Legacy(LegacyResponse),
}

impl ResponsePayload {
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

/// Canonical response row for admin views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseView {
    pub response_id: Option<String>,
    pub form_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_username: String,
    pub submitted_at: String,
    pub question_answers: Vec<QuestionAnswer>,
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Map both payload shapes to `ResponseView`, sorted by user name.
///
/// Legacy rows take user details from `users` and question text from
/// `form`, with placeholder labels when either lookup misses.
#[must_use]
pub fn normalize_responses(payloads: Vec<ResponsePayload>, users: &[User], form: Option<&Form>) -> Vec<ResponseView> {
    let users_by_id: HashMap<&str, &User> = users.iter().map(|u| (u.id.as_str(), u)).collect();

    let mut views: Vec<ResponseView> = payloads
        .into_iter()
        .map(|payload| match payload {
            ResponsePayload::Enriched(row) => from_enriched(row),
            ResponsePayload::Legacy(row) => from_legacy(row, &users_by_id, form),
        })
        .collect();

    views.sort_by(|a, b| {
        a.user_name
            .to_lowercase()
            .cmp(&b.user_name.to_lowercase())
            .then_with(|| a.user_name.cmp(&b.user_name))
    });
    views
}

fn from_enriched(row: EnrichedResponse) -> ResponseView {
    ResponseView {
        response_id: row.response_id,
        form_id: row.form_id,
        user_id: row.user_id,
        user_name: row.user_name,
        user_email: row.user_email.unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
        user_username: row.user_username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
        submitted_at: row.submitted_at,
        question_answers: row.question_answers,
    }
}

fn from_legacy(row: LegacyResponse, users: &HashMap<&str, &User>, form: Option<&Form>) -> ResponseView {
    let user = users.get(row.user_id.as_str());
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    let question_answers = row
        .answers
        .into_iter()
        .map(|answer| {
            let question = form.and_then(|f| f.question(&answer.question_id));
            QuestionAnswer {
                question_text: question
                    .map_or_else(|| format!("Question ID: {}", answer.question_id), |q| q.text.clone()),
                question_type: question.map_or_else(|| DEFAULT_QUESTION_TYPE.to_string(), |q| q.kind.clone()),
                question_id: answer.question_id,
                answer: answer.answer,
            }
        })
        .collect();

    ResponseView {
        response_id: row.id,
        form_id: row.form_id,
        user_name: user
            .and_then(|u| non_empty(&u.full_name))
            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        user_email: user
            .and_then(|u| non_empty(&u.email))
            .unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
        user_username: user
            .and_then(|u| non_empty(&u.username))
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
        user_id: row.user_id,
        submitted_at: row.submitted_at,
        question_answers,
    }
}

// =============================================================================
// ADMIN FETCH
// =============================================================================

/// Admin-only response queries, gated on the session user's role.
pub struct AdminResponses {
    session: Arc<SessionManager>,
}

impl AdminResponses {
    #[must_use]
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    fn client(&self) -> &ApiClient {
        self.session.client()
    }

    /// `GET /admin/forms/{form_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] for non-admins, or any request/decode error.
    pub async fn fetch_form(&self, form_id: &str) -> Result<Form, ClientError> {
        self.session.require_admin()?;
        self.client().get_json(&format!("/admin/forms/{form_id}")).await
    }

    /// All responses to a form, normalized and sorted by user name.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] for non-admins, or any error fetching the
    /// responses themselves. Failures of the auxiliary user/form lookups are
    /// logged and replaced with placeholder labels.
    pub async fn fetch_form_responses(&self, form_id: &str) -> Result<Vec<ResponseView>, ClientError> {
        self.session.require_admin()?;
        let payloads: Vec<ResponsePayload> = self
            .client()
            .get_json(&format!("/admin/forms/{form_id}/responses"))
            .await?;

        if !payloads.iter().any(ResponsePayload::is_legacy) {
            return Ok(normalize_responses(payloads, &[], None));
        }

        let users = match self.client().get_json::<Vec<User>>("/admin/users").await {
            Ok(users) => users,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "user lookup for legacy responses failed");
                Vec::new()
            }
        };
        let form = match self.fetch_form(form_id).await {
            Ok(form) => Some(form),
            Err(e) => {
                warn!(%form_id, code = e.error_code(), error = %e, "form lookup for legacy responses failed");
                None
            }
        };

        Ok(normalize_responses(payloads, &users, form.as_ref()))
    }
}

#[cfg(test)]
#[path = "responses_test.rs"]
mod tests;

//! # progress-client
//!
//! Auth and session core for the Self Progress Chart client: a token store,
//! an HTTP client that refreshes an expired access token once and retries,
//! and a session manager that tracks who is logged in.
//!
//! Screens get one `SessionManager` (shared by `Arc`) and issue protected
//! calls through its `ApiClient`. Admin views read form responses through
//! `AdminResponses`, which normalizes the two response shapes the backend
//! may return.

pub mod client;
pub mod config;
pub mod error;
pub mod responses;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_helpers;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use responses::{AdminResponses, ResponseView, normalize_responses};
pub use session::{SessionManager, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenKind, TokenStore};
pub use transport::{HttpTransport, Transport};
pub use types::{Role, User};

/// Install a fmt subscriber. A no-op when the host already set a global one.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

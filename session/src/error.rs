//! Error types for session resolution.

use thiserror::Error;

/// Failures while obtaining a session from the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session is available from any source.
    #[error("not signed in")]
    NotAuthenticated,

    /// A session exists but its access token has expired.
    #[error("session expired at {expired_at}")]
    SessionExpired {
        /// When the token stopped being valid (RFC 3339).
        expired_at: String,
    },

    /// The stored or supplied token could not be interpreted.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// IO error while reading or writing the session file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Session file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The notes home directory could not be determined.
    #[error("Configuration error: {0}")]
    Config(String),
}

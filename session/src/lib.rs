//! Session handling for the notes client.
//!
//! The identity provider itself (sign-in pages, token refresh) lives outside
//! this workspace. This crate only knows how to *read* the session it
//! issued: either a token handed over through the environment or one saved
//! by `notes login`.
//!
//! - [`SessionProvider`]: the "get current session" operation
//! - [`SessionManager`]: environment first, then the on-disk store
//! - [`SessionStore`]: `session.json` in the notes home directory

mod error;
pub mod jwt;
pub mod manager;
pub mod storage;

pub use error::AuthError;
pub use manager::{SessionManager, SessionWithSource, TokenSource};
pub use storage::SessionStore;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the notes home directory.
pub const NOTES_HOME_ENV_VAR: &str = "NOTES_HOME";

/// Environment variable carrying an access token issued out of band.
pub const ACCESS_TOKEN_ENV_VAR: &str = "NOTES_ACCESS_TOKEN";

/// A signed-in session as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent with every GraphQL request.
    pub access_token: String,

    /// OIDC id token, kept for providers that authorize with it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// When the access token stops being accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Signed-in user, for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Session {
    /// Builds a session from a bare access token, filling expiry and user
    /// name from the token's claims when it is a JWT.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        let claims = jwt::decode_claims(&access_token);
        Self {
            expires_at: claims.as_ref().and_then(jwt::TokenClaims::expires_at),
            username: claims
                .as_ref()
                .and_then(|c| c.display_name().map(String::from)),
            access_token,
            id_token: None,
        }
    }

    /// Whether the token is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Rejects the session if its token is empty or has expired.
    pub fn ensure_valid(self) -> Result<Self, AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::InvalidSession("access token is empty".to_string()));
        }
        match self.expires_at {
            Some(exp) if self.is_expired_at(Utc::now()) => Err(AuthError::SessionExpired {
                expired_at: exp.to_rfc3339(),
            }),
            _ => Ok(self),
        }
    }
}

/// The identity provider's "get current session" operation.
///
/// May suspend on IO. Fails when no usable session exists; callers do not
/// retry.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> Result<Session, AuthError>;
}

/// A provider that always yields the same session. Handy for tests and for
/// API-key backends where the "session" is static.
#[derive(Debug, Clone)]
pub struct StaticSession(pub Session);

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_session(&self) -> Result<Session, AuthError> {
        Ok(self.0.clone())
    }
}

/// Resolves the notes home directory.
///
/// Priority: `$NOTES_HOME`, then `~/.notes`.
pub fn find_notes_home() -> Result<PathBuf, AuthError> {
    if let Ok(path) = std::env::var(NOTES_HOME_ENV_VAR)
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    dirs::home_dir()
        .map(|home| home.join(".notes"))
        .ok_or_else(|| AuthError::Config("Cannot determine home directory".to_string()))
}

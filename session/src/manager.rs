//! Session resolution across token sources.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{ACCESS_TOKEN_ENV_VAR, AuthError, Session, SessionProvider, SessionStore};

/// Where a session was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `$NOTES_ACCESS_TOKEN`
    Environment,
    /// `session.json` written by `notes login`
    Storage,
}

/// Session with its source information.
#[derive(Debug, Clone)]
pub struct SessionWithSource {
    pub session: Session,
    pub source: TokenSource,
}

/// Resolves the current session.
///
/// An access token in the environment wins over the stored session so that
/// scripted use never touches the session file.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: SessionStore,
    env_token: Option<String>,
}

impl SessionManager {
    /// Creates a manager for `notes_home`, capturing `$NOTES_ACCESS_TOKEN`.
    pub fn new(notes_home: impl Into<PathBuf>) -> Self {
        let env_token = std::env::var(ACCESS_TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self {
            store: SessionStore::new(notes_home),
            env_token,
        }
    }

    /// Creates a manager that only consults the session file.
    pub fn storage_only(notes_home: impl Into<PathBuf>) -> Self {
        Self {
            store: SessionStore::new(notes_home),
            env_token: None,
        }
    }

    /// Overrides the environment token (tests, embedding).
    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        self.env_token = token;
        self
    }

    /// Finds a valid session, reporting where it came from.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` when neither source has a session
    /// - `SessionExpired` when the chosen session is past its expiry
    pub fn resolve(&self) -> Result<SessionWithSource, AuthError> {
        if let Some(token) = &self.env_token {
            tracing::debug!("using access token from ${ACCESS_TOKEN_ENV_VAR}");
            let session = Session::from_access_token(token.trim()).ensure_valid()?;
            return Ok(SessionWithSource {
                session,
                source: TokenSource::Environment,
            });
        }

        match self.store.load()? {
            Some(session) => {
                // Older files may lack an explicit expiry; fall back to the JWT claim.
                let session = if session.expires_at.is_none() {
                    let from_claims = Session::from_access_token(session.access_token.clone());
                    Session {
                        expires_at: from_claims.expires_at,
                        username: session.username.or(from_claims.username),
                        ..session
                    }
                } else {
                    session
                };
                tracing::debug!("using stored session from {}", self.store.path().display());
                Ok(SessionWithSource {
                    session: session.ensure_valid()?,
                    source: TokenSource::Storage,
                })
            }
            None => Err(AuthError::NotAuthenticated),
        }
    }

    /// Stores a session issued by the identity provider.
    pub fn login(&self, session: &Session) -> Result<(), AuthError> {
        self.store.save(session)?;
        tracing::info!(
            "signed in{}",
            session
                .username
                .as_deref()
                .map(|u| format!(" as {u}"))
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Forgets the stored session. Returns whether one existed.
    pub fn logout(&self) -> Result<bool, AuthError> {
        self.store.clear()
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn current_session(&self) -> Result<Session, AuthError> {
        self.resolve().map(|s| s.session)
    }
}

//! `notes login` / `notes logout`.
//!
//! Signing in happens with the identity provider; `login` only records the
//! token it issued.

use std::path::Path;

use anyhow::Context;
use chrono::TimeDelta;
use chrono::Utc;
use clap::Parser;
use notes_session::Session;
use notes_session::SessionManager;

#[derive(Debug, Parser)]
pub struct LoginArgs {
    /// Access token issued by the identity provider.
    #[arg(long = "token")]
    pub token: String,

    /// OIDC id token, for backends that authorize with it.
    #[arg(long = "id-token")]
    pub id_token: Option<String>,

    /// Token lifetime in seconds. Defaults to the token's own `exp` claim.
    #[arg(long = "expires-in")]
    pub expires_in: Option<i64>,

    /// Display name to remember for this session.
    #[arg(long = "username")]
    pub username: Option<String>,
}

impl LoginArgs {
    pub fn into_session(self) -> anyhow::Result<Session> {
        let mut session = Session::from_access_token(self.token.trim());
        if let Some(secs) = self.expires_in {
            let expires_at = TimeDelta::try_seconds(secs)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .with_context(|| format!("--expires-in {secs} is out of range"))?;
            session.expires_at = Some(expires_at);
        }
        if self.id_token.is_some() {
            session.id_token = self.id_token;
        }
        if self.username.is_some() {
            session.username = self.username;
        }
        session.ensure_valid().context("refusing to store session")
    }
}

pub fn run_login(notes_home: &Path, args: LoginArgs) -> anyhow::Result<()> {
    let session = args.into_session()?;
    let manager = SessionManager::storage_only(notes_home);
    manager.login(&session).context("failed to save session")?;

    match &session.username {
        Some(name) => println!("Signed in as {name}."),
        None => println!("Signed in."),
    }
    if let Some(exp) = session.expires_at {
        println!("Session expires at {}.", exp.to_rfc3339());
    }
    Ok(())
}

pub fn run_logout(notes_home: &Path) -> anyhow::Result<()> {
    let manager = SessionManager::storage_only(notes_home);
    if manager.logout().context("failed to remove session")? {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

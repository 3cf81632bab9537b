//! Command implementations behind the `notes` binary.

pub mod notes_cmd;
pub mod render;
pub mod session_cmd;
pub mod watch_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use notes_core::ClientError;
use notes_core::ClientProvider;
use notes_core::ConfigLoader;
use notes_core::NotesConfig;
use notes_session::SessionManager;

/// Resolves the notes home: explicit flag, then `$NOTES_HOME`, then
/// `~/.notes`.
pub fn resolve_notes_home(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => notes_session::find_notes_home().context("failed to locate notes home"),
    }
}

pub fn load_config(notes_home: PathBuf) -> anyhow::Result<NotesConfig> {
    ConfigLoader::new()
        .with_notes_home(notes_home)
        .load()
        .context("failed to load configuration")
}

/// Builds the client provider for `config`, backed by the session manager
/// for the same notes home.
pub fn client_provider(config: NotesConfig) -> ClientProvider {
    let sessions = SessionManager::new(config.notes_home.clone());
    ClientProvider::new(config, Arc::new(sessions))
}

/// Turns a client error into a user-facing error, pointing at `notes login`
/// when the failure is about credentials.
pub fn explain(err: ClientError) -> anyhow::Error {
    if err.is_auth_failure() {
        anyhow::anyhow!("{err}\nSign in with `notes login --token <TOKEN>` and try again.")
    } else {
        anyhow::Error::new(err)
    }
}

//! On-disk session storage.
//!
//! A single `session.json` in the notes home directory. The file holds a
//! bearer token so it is created with 0600 permissions on Unix.

use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AuthError, Session};

/// Storage file name.
const SESSION_FILE: &str = "session.json";

/// Current schema version.
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    session: Session,
}

/// Reads and writes the persisted session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    notes_home: PathBuf,
}

impl SessionStore {
    pub fn new(notes_home: impl Into<PathBuf>) -> Self {
        Self {
            notes_home: notes_home.into(),
        }
    }

    /// Full path of the session file.
    pub fn path(&self) -> PathBuf {
        self.notes_home.join(SESSION_FILE)
    }

    /// Loads the stored session, `Ok(None)` when nobody has signed in.
    pub fn load(&self) -> Result<Option<Session>, AuthError> {
        let path = self.path();
        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Io(e)),
        };

        let file: SessionFile = serde_json::from_str(&contents)?;
        if file.version != SCHEMA_VERSION {
            tracing::warn!(
                "session file {} has version {}, expected {SCHEMA_VERSION}",
                path.display(),
                file.version
            );
        }
        Ok(Some(file.session))
    }

    /// Persists `session`, replacing any previous one.
    pub fn save(&self, session: &Session) -> Result<(), AuthError> {
        let path = self.path();
        ensure_parent(&path)?;

        #[cfg(unix)]
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)?;

        #[cfg(not(unix))]
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let json = serde_json::to_string_pretty(&SessionFile {
            version: SCHEMA_VERSION,
            session: session.clone(),
        })?;
        file.write_all(json.as_bytes())?;
        tracing::debug!("saved session to {}", path.display());
        Ok(())
    }

    /// Removes the stored session. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, AuthError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::Io(e)),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

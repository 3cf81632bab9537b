//! Note records and the events that change them.

use serde::{Deserialize, Deserializer, Serialize};

/// A server-owned note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Opaque, server-assigned identifier.
    pub id: String,
    pub name: String,
    /// Free text. The schema allows `null`, which we read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub details: String,
}

impl Note {
    pub fn new(id: impl Into<String>, name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            details: details.into(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unsaved form input for a note that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DraftNote {
    pub name: String,
    pub details: String,
}

impl DraftNote {
    pub fn new(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            details: details.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.details.is_empty()
    }

    /// Returns the current contents and resets both fields.
    pub fn take(&mut self) -> DraftNote {
        std::mem::take(self)
    }
}

/// Which change stream an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn all() -> &'static [ChangeKind] {
        &[ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
    }

    /// Root field of the subscription payload.
    pub fn field(&self) -> &'static str {
        match self {
            ChangeKind::Created => "onCreateNote",
            ChangeKind::Updated => "onUpdateNote",
            ChangeKind::Deleted => "onDeleteNote",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

/// One server-side change delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(Note),
    Updated(Note),
    /// Carries the note as it was at deletion; only the id matters locally.
    Deleted(Note),
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, note: Note) -> Self {
        match kind {
            ChangeKind::Created => ChangeEvent::Created(note),
            ChangeKind::Updated => ChangeEvent::Updated(note),
            ChangeKind::Deleted => ChangeEvent::Deleted(note),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Created(_) => ChangeKind::Created,
            ChangeEvent::Updated(_) => ChangeKind::Updated,
            ChangeEvent::Deleted(_) => ChangeKind::Deleted,
        }
    }

    pub fn note(&self) -> &Note {
        match self {
            ChangeEvent::Created(note) | ChangeEvent::Updated(note) | ChangeEvent::Deleted(note) => {
                note
            }
        }
    }
}

//! Operation documents and wire types for the notes schema.
//!
//! The schema is owned by the backend; these documents select exactly the
//! three fields the client renders.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::note::{ChangeKind, DraftNote, Note};

use super::{ClientError, ClientResult};

pub const LIST_NOTES: &str = r#"query ListNotes {
  listNotes {
    items {
      id
      name
      details
    }
  }
}"#;

pub const CREATE_NOTE: &str = r#"mutation CreateNote($input: CreateNoteInput!) {
  createNote(input: $input) {
    id
    name
    details
  }
}"#;

pub const DELETE_NOTE: &str = r#"mutation DeleteNote($input: DeleteNoteInput!) {
  deleteNote(input: $input) {
    id
    name
    details
  }
}"#;

pub const ON_CREATE_NOTE: &str = r#"subscription OnCreateNote {
  onCreateNote {
    id
    name
    details
  }
}"#;

pub const ON_UPDATE_NOTE: &str = r#"subscription OnUpdateNote {
  onUpdateNote {
    id
    name
    details
  }
}"#;

pub const ON_DELETE_NOTE: &str = r#"subscription OnDeleteNote {
  onDeleteNote {
    id
    name
    details
  }
}"#;

/// Subscription document for a change stream.
pub fn subscription_document(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Created => ON_CREATE_NOTE,
        ChangeKind::Updated => ON_UPDATE_NOTE,
        ChangeKind::Deleted => ON_DELETE_NOTE,
    }
}

/// Body of a GraphQL-over-HTTP request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphQlRequest {
    pub fn new(query: &'static str, operation_name: &'static str) -> Self {
        Self {
            query,
            operation_name: Some(operation_name),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn list_notes() -> Self {
        Self::new(LIST_NOTES, "ListNotes")
    }

    pub fn create_note(draft: &DraftNote) -> Self {
        Self::new(CREATE_NOTE, "CreateNote").with_variables(serde_json::json!({
            "input": {
                "name": draft.name,
                "details": draft.details,
            }
        }))
    }

    pub fn delete_note(id: &str) -> Self {
        Self::new(DELETE_NOTE, "DeleteNote").with_variables(serde_json::json!({
            "input": { "id": id }
        }))
    }

    pub fn subscribe(kind: ChangeKind) -> Self {
        let operation_name = match kind {
            ChangeKind::Created => "OnCreateNote",
            ChangeKind::Updated => "OnUpdateNote",
            ChangeKind::Deleted => "OnDeleteNote",
        };
        Self::new(subscription_document(kind), operation_name)
    }
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlError {
    pub message: String,
    /// AppSync-style error classification, e.g. `Unauthorized`.
    #[serde(default)]
    pub error_type: Option<String>,
}

/// Standard GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl<T> GraphQlResponse<T> {
    /// Collapses the envelope: any error wins over partial data.
    pub fn into_result(self) -> ClientResult<T> {
        if !self.errors.is_empty() {
            return Err(ClientError::from_graphql_errors(self.errors));
        }
        self.data
            .ok_or_else(|| ClientError::Parse("response has neither data nor errors".to_string()))
    }
}

/// Decodes a response body into `T`.
pub fn parse_response<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    let envelope: GraphQlResponse<T> = serde_json::from_str(body)
        .map_err(|e| ClientError::Parse(format!("invalid GraphQL response: {e}")))?;
    envelope.into_result()
}

#[derive(Debug, Deserialize)]
pub struct ListNotesData {
    #[serde(rename = "listNotes")]
    pub list_notes: Option<NoteConnection>,
}

#[derive(Debug, Deserialize)]
pub struct NoteConnection {
    /// The backend may return `null` holes for items the caller cannot see.
    #[serde(default)]
    pub items: Vec<Option<Note>>,
}

impl ListNotesData {
    pub fn into_notes(self) -> Vec<Note> {
        self.list_notes
            .map(|conn| conn.items.into_iter().flatten().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteData {
    #[serde(rename = "createNote")]
    pub create_note: Option<Note>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNoteData {
    #[serde(rename = "deleteNote")]
    pub delete_note: Option<Note>,
}

/// Pulls the note out of a subscription payload such as
/// `{"onCreateNote": {...}}`. A `null` payload yields `None`.
pub fn subscription_note(kind: ChangeKind, data: &Value) -> ClientResult<Option<Note>> {
    match data.get(kind.field()) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ClientError::Parse(format!("invalid {kind} payload: {e}"))),
    }
}

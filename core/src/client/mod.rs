//! GraphQL client for the notes backend.
//!
//! [`NotesClient`] speaks GraphQL over HTTP for the query and mutations and
//! GraphQL over Server-Sent Events for the three change streams.
//! [`NotesBackend`] is the seam the view-model talks to.

pub mod graphql;
mod http;

pub use http::{AuthMode, NotesClient, TransportConfig};

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use notes_session::AuthError;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::note::{ChangeEvent, ChangeKind, DraftNote, Note};

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The identity provider refused to hand out a session.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Network request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend answered with a non-success HTTP status.
    #[error("API error ({status}): {message}")]
    ApiResponse { status: u16, message: String },

    /// Backend answered with GraphQL errors.
    #[error("GraphQL error: {message}")]
    GraphQl {
        message: String,
        error_type: Option<String>,
    },

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Subscription transport failed.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub(crate) fn from_graphql_errors(errors: Vec<graphql::GraphQlError>) -> Self {
        let error_type = errors.iter().find_map(|e| e.error_type.clone());
        let message = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        ClientError::GraphQl {
            message,
            error_type,
        }
    }

    /// Whether the failure came from missing or rejected credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ClientError::Auth(_) => true,
            ClientError::ApiResponse { status, .. } => *status == 401 || *status == 403,
            ClientError::GraphQl { error_type, .. } => error_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("Unauthorized")),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// The operations the notes view consumes.
#[async_trait]
pub trait NotesBackend: Send + Sync {
    /// All notes in server order.
    async fn list_notes(&self) -> ClientResult<Vec<Note>>;

    /// Creates a note from a draft and returns the stored note.
    async fn create_note(&self, draft: &DraftNote) -> ClientResult<Note>;

    /// Deletes a note by id. Returns the deleted note when the backend echoes it.
    async fn delete_note(&self, id: &str) -> ClientResult<Option<Note>>;

    /// Opens one long-lived change stream.
    async fn subscribe(&self, kind: ChangeKind) -> ClientResult<NoteSubscription>;
}

/// A live change stream.
///
/// Yields one item per delivered event; `Err` items are per-event failures
/// and the stream stays open after them. The stream ends when the backend
/// completes it, the transport drops, or [`unsubscribe`](Self::unsubscribe)
/// is called. Dropping the subscription unsubscribes.
pub struct NoteSubscription {
    kind: ChangeKind,
    rx: mpsc::Receiver<ClientResult<ChangeEvent>>,
    token: CancellationToken,
}

impl NoteSubscription {
    /// `token` is cancelled on unsubscribe; the producer feeding `rx`
    /// should stop when it fires.
    pub fn new(
        kind: ChangeKind,
        rx: mpsc::Receiver<ClientResult<ChangeEvent>>,
        token: CancellationToken,
    ) -> Self {
        Self { kind, rx, token }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn unsubscribe(&self) {
        if !self.is_unsubscribed() {
            tracing::debug!("unsubscribing from {}", self.kind);
            self.token.cancel();
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for NoteSubscription {
    type Item = ClientResult<ChangeEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for NoteSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for NoteSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteSubscription")
            .field("kind", &self.kind)
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}

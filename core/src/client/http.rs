//! HTTP transport for [`NotesClient`].
//!
//! Queries and mutations are plain `POST`s. Subscriptions use the
//! "distinct connections" flavour of GraphQL over SSE: one `POST` per
//! subscription with `Accept: text/event-stream`, answered by a stream of
//! `next` events and a final `complete`.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::graphql::{
    self, CreateNoteData, DeleteNoteData, GraphQlRequest, GraphQlResponse, ListNotesData,
};
use super::{ClientError, ClientResult, NoteSubscription, NotesBackend};
use crate::note::{ChangeEvent, ChangeKind, DraftNote, Note};

/// Header carrying the API key in `API_KEY` mode.
const API_KEY_HEADER: &str = "x-api-key";

/// Buffered events per subscription before the reader waits on the consumer.
const SUBSCRIPTION_BUFFER: usize = 64;

/// How a request proves who it is.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// User-pool JWT, sent verbatim in `Authorization`.
    UserPools { jwt_token: String },
    /// OIDC token, sent verbatim in `Authorization`.
    OpenIdConnect { token: String },
    /// Static key in `x-api-key`.
    ApiKey { key: String },
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print credentials.
        let name = match self {
            AuthMode::UserPools { .. } => "UserPools",
            AuthMode::OpenIdConnect { .. } => "OpenIdConnect",
            AuthMode::ApiKey { .. } => "ApiKey",
        };
        f.debug_struct(name).finish_non_exhaustive()
    }
}

/// Everything needed to reach the backend.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: reqwest::Url,
    pub region: String,
    pub auth: AuthMode,
}

impl TransportConfig {
    fn auth_headers(&self) -> ClientResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let (name, value) = match &self.auth {
            AuthMode::UserPools { jwt_token } => (AUTHORIZATION, jwt_token.as_str()),
            AuthMode::OpenIdConnect { token } => (AUTHORIZATION, token.as_str()),
            AuthMode::ApiKey { key } => (HeaderName::from_static(API_KEY_HEADER), key.as_str()),
        };
        let mut value = HeaderValue::from_str(value).map_err(|_| {
            ClientError::InvalidConfig("credential is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(name, value);
        Ok(headers)
    }
}

/// Authenticated GraphQL client.
///
/// Cheap to share behind an `Arc`; the underlying `reqwest::Client` pools
/// connections.
#[derive(Debug, Clone)]
pub struct NotesClient {
    http: reqwest::Client,
    transport: TransportConfig,
    request_timeout: Duration,
}

impl NotesClient {
    pub fn new(transport: TransportConfig, request_timeout: Duration) -> Self {
        Self::with_client(
            crate::default_client::create_client(),
            transport,
            request_timeout,
        )
    }

    /// Creates a client with a custom HTTP client.
    pub fn with_client(
        http: reqwest::Client,
        transport: TransportConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            transport,
            request_timeout,
        }
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Sends one query or mutation and decodes its `data`.
    async fn execute<T: DeserializeOwned>(&self, request: &GraphQlRequest) -> ClientResult<T> {
        tracing::debug!(
            "GraphQL {} -> {}",
            request.operation_name.unwrap_or("anonymous"),
            self.transport.url
        );

        let response = self
            .http
            .post(self.transport.url.clone())
            .headers(self.transport.auth_headers()?)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        graphql::parse_response(&body)
    }
}

/// Builds an `ApiResponse` error, lifting a GraphQL error message out of the
/// body when there is one.
fn api_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<GraphQlResponse<Value>>(body)
        .ok()
        .and_then(|r| r.errors.into_iter().next().map(|e| e.message))
        .unwrap_or_else(|| body.trim().to_string());
    ClientError::ApiResponse { status, message }
}

#[async_trait]
impl NotesBackend for NotesClient {
    async fn list_notes(&self) -> ClientResult<Vec<Note>> {
        let data: ListNotesData = self.execute(&GraphQlRequest::list_notes()).await?;
        let notes = data.into_notes();
        tracing::debug!("listNotes returned {} notes", notes.len());
        Ok(notes)
    }

    async fn create_note(&self, draft: &DraftNote) -> ClientResult<Note> {
        let data: CreateNoteData = self.execute(&GraphQlRequest::create_note(draft)).await?;
        data.create_note
            .ok_or_else(|| ClientError::Parse("createNote returned null".to_string()))
    }

    async fn delete_note(&self, id: &str) -> ClientResult<Option<Note>> {
        let data: DeleteNoteData = self.execute(&GraphQlRequest::delete_note(id)).await?;
        Ok(data.delete_note)
    }

    async fn subscribe(&self, kind: ChangeKind) -> ClientResult<NoteSubscription> {
        let mut headers = self.transport.auth_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        // No overall timeout here: the response body lives as long as the
        // subscription does.
        let response = self
            .http
            .post(self.transport.url.clone())
            .headers(headers)
            .json(&GraphQlRequest::subscribe(kind))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }
        tracing::info!("subscribed to {kind}");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let token = CancellationToken::new();
        let reader_token = token.clone();
        let events = response.bytes_stream().eventsource();

        tokio::spawn(async move {
            tokio::select! {
                _ = reader_token.cancelled() => {
                    tracing::debug!("{kind} stream closed by unsubscribe");
                }
                _ = pump_events(kind, events, tx) => {}
            }
        });

        Ok(NoteSubscription::new(kind, rx, token))
    }
}

/// Reads SSE events and forwards decoded change events until the stream
/// completes, breaks, or the consumer goes away.
async fn pump_events<S, E>(
    kind: ChangeKind,
    events: S,
    tx: mpsc::Sender<ClientResult<ChangeEvent>>,
) where
    S: Stream<Item = Result<eventsource_stream::Event, E>>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(events);

    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                let _ = tx
                    .send(Err(ClientError::Stream(format!("{kind}: {e}"))))
                    .await;
                return;
            }
        };

        let forwarded = match event.event.as_str() {
            "next" | "message" => match decode_next(kind, &event.data) {
                Ok(Some(change)) => Some(Ok(change)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            },
            "complete" => {
                tracing::info!("{kind} stream completed by server");
                return;
            }
            other => {
                tracing::debug!("ignoring SSE event '{other}' on {kind}");
                None
            }
        };

        if let Some(item) = forwarded
            && tx.send(item).await.is_err()
        {
            // Receiver dropped, stop processing
            return;
        }
    }

    tracing::info!("{kind} stream ended");
}

/// Decodes the payload of a `next` event.
fn decode_next(kind: ChangeKind, data: &str) -> ClientResult<Option<ChangeEvent>> {
    if data.trim().is_empty() {
        return Ok(None);
    }
    let payload: Value = graphql::parse_response(data)?;
    Ok(graphql::subscription_note(kind, &payload)?.map(|note| ChangeEvent::new(kind, note)))
}

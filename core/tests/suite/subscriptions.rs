use std::time::Duration;

use futures::StreamExt;
use notes_core::ChangeEvent;
use notes_core::ChangeKind;
use notes_core::ClientError;
use notes_core::Note;
use notes_core::NotesBackend;
use notes_core::NotesClient;
use notes_core::client::AuthMode;
use notes_core::client::TransportConfig;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::header;
use wiremock::matchers::method;

fn client_for(server: &MockServer) -> NotesClient {
    let transport = TransportConfig {
        url: reqwest::Url::parse(&format!("{}/graphql", server.uri())).unwrap(),
        region: "us-east-1".to_string(),
        auth: AuthMode::UserPools {
            jwt_token: "jwt-token".to_string(),
        },
    };
    NotesClient::with_client(reqwest::Client::new(), transport, Duration::from_secs(5))
}

/// Builds an SSE body from `(event, data)` pairs.
fn sse(events: &[(&str, serde_json::Value)]) -> String {
    let mut body = String::new();
    for (event, data) in events {
        body.push_str(&format!("event: {event}\ndata: {data}\n\n"));
    }
    body
}

async fn collect(
    mut subscription: notes_core::NoteSubscription,
) -> Vec<Result<ChangeEvent, ClientError>> {
    let mut items = Vec::new();
    while let Some(item) =
        tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("subscription stalled")
    {
        items.push(item);
    }
    items
}

#[tokio::test]
async fn created_events_stream_until_complete() {
    let server = MockServer::start().await;
    let body = sse(&[
        (
            "next",
            json!({ "data": { "onCreateNote": { "id": "1", "name": "A", "details": "a" } } }),
        ),
        (
            "next",
            json!({ "data": { "onCreateNote": { "id": "2", "name": "B", "details": "b" } } }),
        ),
        ("complete", json!({})),
    ]);
    Mock::given(method("POST"))
        .and(header("accept", "text/event-stream"))
        .and(header("authorization", "jwt-token"))
        .and(body_partial_json(json!({ "operationName": "OnCreateNote" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let subscription = client_for(&server)
        .subscribe(ChangeKind::Created)
        .await
        .unwrap();
    assert_eq!(subscription.kind(), ChangeKind::Created);

    let events: Vec<ChangeEvent> = collect(subscription)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(
        events,
        vec![
            ChangeEvent::Created(Note::new("1", "A", "a")),
            ChangeEvent::Created(Note::new("2", "B", "b")),
        ]
    );
}

#[tokio::test]
async fn error_event_does_not_end_the_stream() {
    let server = MockServer::start().await;
    let body = sse(&[
        ("next", json!({ "errors": [{ "message": "not allowed" }] })),
        (
            "next",
            json!({ "data": { "onDeleteNote": { "id": "9", "name": "x", "details": "y" } } }),
        ),
    ]);
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "OnDeleteNote" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let items = collect(
        client_for(&server)
            .subscribe(ChangeKind::Deleted)
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Err(ClientError::GraphQl { message, .. }) if message == "not allowed"));
    assert_eq!(
        items[1].as_ref().unwrap(),
        &ChangeEvent::Deleted(Note::new("9", "x", "y"))
    );
}

#[tokio::test]
async fn events_for_other_fields_are_skipped() {
    let server = MockServer::start().await;
    let body = sse(&[
        ("ping", json!({})),
        ("next", json!({ "data": { "onUpdateNote": null } })),
        (
            "next",
            json!({ "data": { "onUpdateNote": { "id": "3", "name": "C", "details": "c" } } }),
        ),
    ]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let items = collect(
        client_for(&server)
            .subscribe(ChangeKind::Updated)
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].as_ref().unwrap(),
        &ChangeEvent::Updated(Note::new("3", "C", "c"))
    );
}

#[tokio::test]
async fn rejected_subscription_fails_to_open() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .subscribe(ChangeKind::Created)
        .await
        .unwrap_err();

    assert!(err.is_auth_failure());
    assert!(matches!(err, ClientError::ApiResponse { status: 403, ref message } if message == "Forbidden"));
}

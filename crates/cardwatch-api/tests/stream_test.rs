#![allow(clippy::unwrap_used)]
// Integration tests for `SseConnector` against a wiremock event-stream endpoint.

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardwatch_api::stream::parse_message;
use cardwatch_api::{Error, SseConnector, StreamConnector, StreamEvent, WireMessage};

async fn connector_for(server: &MockServer) -> SseConnector {
    let url = Url::parse(&format!("{}/api/stream", server.uri())).unwrap();
    SseConnector::with_client(reqwest::Client::new(), url)
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn test_frames_named_events_in_order() {
    let server = MockServer::start().await;

    let body = concat!(
        ": keep-alive comment\n\n",
        "event: ping\ndata: {}\n\n",
        "event: attendance\n",
        "data: {\"uid\":\"A1\",\"user\":{\"id\":1,\"name\":\"Ada\"},\"direction\":\"IN\",\"ts\":\"2024-01-01T09:00:00Z\"}\n\n",
        "event: unknown\ndata: {\"uid\":\"ZZ\",\"ts\":\"2024-01-01T09:01:00Z\"}\n\n",
    );

    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let connector = connector_for(&server).await;
    let messages: Vec<WireMessage> = connector
        .connect()
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    let names: Vec<&str> = messages.iter().map(|m| m.event.as_str()).collect();
    assert_eq!(names, vec!["ping", "attendance", "unknown"]);

    let event = parse_message(&messages[1]).unwrap().unwrap();
    assert!(matches!(event, StreamEvent::Attendance(ref a) if a.user.name == "Ada"));
}

#[tokio::test]
async fn test_unnamed_messages_default_to_message_kind() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .respond_with(sse("data: hello\n\n"))
        .mount(&server)
        .await;

    let connector = connector_for(&server).await;
    let mut stream = connector.connect().await.unwrap();
    let msg = stream.next().await.unwrap().unwrap();

    assert_eq!(msg, WireMessage::new("message", "hello"));
    assert_eq!(parse_message(&msg).unwrap(), None);
}

#[tokio::test]
async fn test_non_success_status_is_connect_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let connector = connector_for(&server).await;
    let result = connector.connect().await;

    assert!(
        matches!(result, Err(Error::StreamConnect(_))),
        "expected StreamConnect error"
    );
}

#[tokio::test]
async fn test_unreachable_host_is_connect_error() {
    let url = Url::parse("http://127.0.0.1:9/api/stream").unwrap();
    let connector = SseConnector::with_client(reqwest::Client::new(), url);

    let result = connector.connect().await;
    assert!(matches!(result, Err(ref e) if e.is_transient()));
}

#[tokio::test]
async fn test_invalid_utf8_only_spoils_its_own_message() {
    let server = MockServer::start().await;

    let mut body = b"event: unknown\ndata: {\"uid\":\"".to_vec();
    body.extend_from_slice(&[0xFF, 0xFE]);
    body.extend_from_slice(b"\",\"ts\":\"2024-01-01T09:00:00Z\"\n\n");
    body.extend_from_slice(b"event: unknown\ndata: {\"uid\":\"ZZ\",\"ts\":\"2024-01-01T09:01:00Z\"}\n\n");

    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .respond_with(
ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let connector = connector_for(&server).await;
    let messages: Vec<Result<WireMessage, Error>> =
        connector.connect().await.unwrap().collect().await;

    assert_eq!(messages.len(), 2);
    let spoiled = messages[0].as_ref().unwrap();
    assert!(spoiled.data.contains('\u{FFFD}'));
    assert!(matches!(
        parse_message(spoiled),
        Err(Error::MalformedPayload { .. })
    ));

    let next = parse_message(messages[1].as_ref().unwrap()).unwrap().unwrap();
    assert!(matches!(next, StreamEvent::Unknown(ref u) if u.uid == "ZZ"));
}

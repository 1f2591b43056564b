//! Server-sent event stream transport and typed event parsing.
//!
//! The backend pushes named events over a `text/event-stream` response.
//! [`SseConnector`] opens that response and frames it into
//! [`WireMessage`]s; [`parse_message`] turns a wire message into a typed
//! [`StreamEvent`]. Reconnection is not handled here: a connector opens
//! exactly one connection per call and the stream ends when it drops.
//!
//! # Example
//!
//! ```rust,ignore
//! use cardwatch_api::stream::{parse_message, SseConnector, StreamConnector};
//! use futures_util::StreamExt;
//!
//! let connector = SseConnector::new(url, &TransportConfig::default())?;
//! let mut messages = connector.connect().await?;
//!
//! while let Some(Ok(msg)) = messages.next().await {
//!     if let Ok(Some(event)) = parse_message(&msg) {
//!         println!("{event:?}");
//!     }
//! }
//! ```

use std::pin::Pin;

use chrono::{DateTime, Utc};
use eventsource_stream::Eventsource;
use futures_util::future::BoxFuture;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::models::{Direction, UserRef, timestamp};
use crate::transport::TransportConfig;

// ── Wire framing ─────────────────────────────────────────────────────

/// One framed message from the event stream, before payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Event name; `message` when the server sent none.
    pub event: String,
    /// Raw `data:` payload, multi-line data joined with `\n`.
    pub data: String,
}

impl WireMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// A live connection's message sequence. Ends when the server closes it.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<WireMessage, Error>> + Send>>;

// ── Typed events ─────────────────────────────────────────────────────

/// `attendance`: a registered card produced an IN/OUT record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub uid: String,
    pub user: UserRef,
    pub direction: Direction,
    #[serde(with = "timestamp")]
    pub ts: DateTime<Utc>,
}

/// `unknown`: a card with no registered owner was presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownEvent {
    pub uid: String,
    #[serde(with = "timestamp")]
    pub ts: DateTime<Utc>,
}

/// Why the backend suppressed a read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IgnoreReason {
    /// Same card re-presented before the check-in cooldown elapsed.
    Cooldown,
    /// Several reads of one card within a short window.
    Burst,
}

/// `ignored`: a read was suppressed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredEvent {
    pub uid: String,
    pub reason: IgnoreReason,
    #[serde(rename = "secondsLeft", default, skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(with = "timestamp")]
    pub ts: DateTime<Utc>,
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Attendance(AttendanceEvent),
    Unknown(UnknownEvent),
    Ignored(IgnoredEvent),
    /// Keep-alive. Carries nothing.
    Ping,
}

impl StreamEvent {
    /// Wire name of this event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attendance(_) => "attendance",
            Self::Unknown(_) => "unknown",
            Self::Ignored(_) => "ignored",
            Self::Ping => "ping",
        }
    }

    /// Card identifier, present on every kind except `Ping`.
    pub fn card_id(&self) -> Option<&str> {
        match self {
            Self::Attendance(e) => Some(&e.uid),
            Self::Unknown(e) => Some(&e.uid),
            Self::Ignored(e) => Some(&e.uid),
            Self::Ping => None,
        }
    }

    /// Event time, present on every kind except `Ping`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Attendance(e) => Some(e.ts),
            Self::Unknown(e) => Some(e.ts),
            Self::Ignored(e) => Some(e.ts),
            Self::Ping => None,
        }
    }
}

/// Decode a wire message into a typed event.
///
/// Returns `Ok(None)` for event names this client does not know, and
/// `Err(MalformedPayload)` when a known kind carries undecodable JSON.
/// `ping` never fails, whatever its payload.
pub fn parse_message(msg: &WireMessage) -> Result<Option<StreamEvent>, Error> {
    let event = match msg.event.as_str() {
        "attendance" => StreamEvent::Attendance(decode(msg)?),
        "unknown" => StreamEvent::Unknown(decode(msg)?),
        "ignored" => StreamEvent::Ignored(decode(msg)?),
        "ping" => StreamEvent::Ping,
        other => {
            tracing::trace!(event = other, "ignoring unrecognized stream event");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn decode<T: serde::de::DeserializeOwned>(msg: &WireMessage) -> Result<T, Error> {
    serde_json::from_str(&msg.data).map_err(|e| Error::MalformedPayload {
        event: msg.event.clone(),
        message: e.to_string(),
    })
}

// ── Connectors ───────────────────────────────────────────────────────

/// Opens one fresh connection to the event stream per call.
pub trait StreamConnector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<MessageStream, Error>>;
}

/// [`StreamConnector`] over HTTP `text/event-stream`.
#[derive(Debug, Clone)]
pub struct SseConnector {
    http: reqwest::Client,
    url: Url,
}

impl SseConnector {
    /// Build a connector with a stream-flavoured client (no total timeout).
    pub fn new(url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_stream_client()?;
        Ok(Self { http, url })
    }

    /// Build a connector around an existing client.
    ///
    /// The client must not carry a total request timeout, or the stream
    /// will be cut off when it expires.
    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn open(&self) -> Result<MessageStream, Error> {
        tracing::info!(url = %self.url, "opening event stream");

        let resp = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Error::StreamConnect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::StreamConnect(format!("HTTP {status}")));
        }

        let mut decoder = LossyUtf8::default();
        let text = resp
            .bytes_stream()
            .map(move |chunk| chunk.map(|bytes| decoder.decode(&bytes)));

        let messages = text.eventsource().map(|item| match item {
            Ok(event) => Ok(WireMessage {
                event: event.event,
                data: event.data,
            }),
            Err(e) => Err(Error::StreamClosed(e.to_string())),
        });

        Ok(Box::pin(messages))
    }
}

/// Incremental UTF-8 decoding that replaces invalid bytes with U+FFFD.
///
/// Bad bytes then surface as a malformed payload on one message instead
/// of failing the whole stream. A sequence split across chunks is held
/// back until the next chunk completes it.
#[derive(Debug, Default)]
struct LossyUtf8 {
    pending: Vec<u8>,
}

impl LossyUtf8 {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = after.get(len..).unwrap_or_default();
                        }
                        // Incomplete tail: wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }
}

impl StreamConnector for SseConnector {
    fn connect(&self) -> BoxFuture<'_, Result<MessageStream, Error>> {
        Box::pin(self.open())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn lossy_decoder_replaces_invalid_bytes() {
        let mut decoder = LossyUtf8::default();
        assert_eq!(decoder.decode(b"uid \xFF\xFEok"), "uid \u{FFFD}\u{FFFD}ok");
        assert!(decoder.pending.is_empty());
    }

    #[test]
    fn lossy_decoder_joins_split_sequences() {
        let mut decoder = LossyUtf8::default();
        assert_eq!(decoder.decode(b"Jos\xC3"), "Jos");
        assert_eq!(decoder.decode(b"\xA9 IN"), "\u{e9} IN");
        assert!(decoder.pending.is_empty());
    }

    #[test]
    fn parse_attendance_event() {
        let msg = WireMessage::new(
            "attendance",
            r#"{"uid":"A1","user":{"id":1,"name":"Ada"},"direction":"IN","ts":"2024-01-01T09:00:00Z"}"#,
        );

        let event = parse_message(&msg).unwrap().unwrap();
        assert_eq!(
            event,
            StreamEvent::Attendance(AttendanceEvent {
                uid: "A1".into(),
                user: UserRef {
                    id: 1,
                    name: "Ada".into()
                },
                direction: Direction::In,
                ts: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            })
        );
        assert_eq!(event.card_id(), Some("A1"));
        assert_eq!(event.name(), "attendance");
    }

    #[test]
    fn parse_ignored_event_with_optional_fields() {
        let msg = WireMessage::new(
            "ignored",
            r#"{"uid":"B2","reason":"cooldown","secondsLeft":3,"ts":"2024-01-01T09:00:05Z"}"#,
        );

        let Some(StreamEvent::Ignored(ignored)) = parse_message(&msg).unwrap() else {
            panic!("expected ignored event");
        };
        assert_eq!(ignored.reason, IgnoreReason::Cooldown);
        assert_eq!(ignored.seconds_left, Some(3));
        assert!(ignored.user.is_none());
    }

    #[test]
    fn parse_burst_with_user() {
        let msg = WireMessage::new(
            "ignored",
            r#"{"uid":"B2","reason":"burst","user":{"id":2,"name":"Bob"},"ts":"2024-01-01 09:00:05"}"#,
        );

        let Some(StreamEvent::Ignored(ignored)) = parse_message(&msg).unwrap() else {
            panic!("expected ignored event");
        };
        assert_eq!(ignored.reason, IgnoreReason::Burst);
        assert_eq!(ignored.user.unwrap().name, "Bob");
    }

    #[test]
    fn parse_unknown_event() {
        let msg = WireMessage::new("unknown", r#"{"uid":"ZZ9","ts":"2024-01-01T09:00:00Z"}"#);
        let event = parse_message(&msg).unwrap().unwrap();
        assert!(matches!(event, StreamEvent::Unknown(ref e) if e.uid == "ZZ9"));
        assert!(event.timestamp().is_some());
    }

    #[test]
    fn ping_ignores_payload() {
        let msg = WireMessage::new("ping", "not json");
        assert_eq!(parse_message(&msg).unwrap(), Some(StreamEvent::Ping));
        assert_eq!(StreamEvent::Ping.card_id(), None);
    }

    #[test]
    fn unrecognized_kinds_are_skipped() {
        let msg = WireMessage::new("message", "{}");
        assert_eq!(parse_message(&msg).unwrap(), None);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let msg = WireMessage::new("attendance", r#"{"uid":"A1"}"#);
        let err = parse_message(&msg).unwrap_err();
        assert!(
            matches!(err, Error::MalformedPayload { ref event, .. } if event == "attendance"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn attendance_without_user_is_malformed() {
        let msg = WireMessage::new("attendance", r#"{"uid":"A1","direction":"IN","ts":"2024-01-01T09:00:00Z"}"#);
        assert!(parse_message(&msg).is_err());
    }

    #[test]
    fn ignore_reason_display() {
        assert_eq!(IgnoreReason::Cooldown.to_string(), "cooldown");
        assert_eq!(IgnoreReason::Burst.to_string(), "burst");
    }
}

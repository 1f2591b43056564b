use thiserror::Error;

/// Top-level error type for the `cardwatch-api` crate.
///
/// Covers every failure mode across both surfaces: REST transport,
/// HTTP status failures, payload decoding, and the event stream.
/// `cardwatch-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failed to build the underlying HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── REST ────────────────────────────────────────────────────────
    /// Non-2xx response. `message` comes from the backend's
    /// `{"error": "..."}` body when it sent one.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The stream could not be opened (DNS, handshake, non-2xx).
    #[error("Event stream connection failed: {0}")]
    StreamConnect(String),

    /// The stream dropped after it was open.
    #[error("Event stream closed: {0}")]
    StreamClosed(String),

    /// A named stream event carried a payload that isn't valid JSON
    /// for its kind.
    #[error("Malformed '{event}' payload: {message}")]
    MalformedPayload { event: String, message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::StreamConnect(_) | Self::StreamClosed(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// ── Core error types ──
//
// User-facing errors from cardwatch-core. Consumers never match on raw
// reqwest or serde failures; `From<cardwatch_api::Error>` translates
// transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Backend request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {what}")]
    NotFound { what: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Operation rejected by backend: {message}")]
    Rejected { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Translate a failed roster mutation.
    ///
    /// Backend refusals become [`Rejected`](Self::Rejected) carrying the
    /// backend's own message; transport failures translate as usual.
    pub(crate) fn from_mutation(err: cardwatch_api::Error) -> Self {
        match err {
            cardwatch_api::Error::Http { status: 404, message } => Self::NotFound { what: message },
            cardwatch_api::Error::Http { message, .. } => Self::Rejected { message },
            other => other.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cardwatch_api::Error> for CoreError {
    fn from(err: cardwatch_api::Error) -> Self {
        match err {
            cardwatch_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: err.status(),
                    }
                }
            }
            cardwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cardwatch_api::Error::ClientBuild(message) => CoreError::Config { message },
            cardwatch_api::Error::Http { status: 404, message } => {
                CoreError::NotFound { what: message }
            }
            cardwatch_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            cardwatch_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            cardwatch_api::Error::StreamConnect(reason) | cardwatch_api::Error::StreamClosed(reason) => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("event stream: {reason}"),
                }
            }
            cardwatch_api::Error::MalformedPayload { event, message } => {
                CoreError::Internal(format!("Malformed '{event}' event: {message}"))
            }
        }
    }
}

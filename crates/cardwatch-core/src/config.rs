// ── Runtime dashboard configuration ──
//
// Describes where the backend lives and how the live layer behaves.
// Never touches disk: the CLI (via cardwatch-config) builds a
// `DashboardConfig` and hands it in.

use std::time::Duration;

use cardwatch_api::{AttendanceFilters, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// API root used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Fixed-delay retry policy for the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait after a connection that had opened drops. Default: 3s.
    pub retry_delay: Duration,
    /// Wait after an attempt that never opened. Default: 5s.
    pub initial_retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            initial_retry_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt, given whether the session has
    /// opened at least once.
    pub fn delay_for(&self, ever_opened: bool) -> Duration {
        if ever_opened {
            self.retry_delay
        } else {
            self.initial_retry_delay
        }
    }
}

/// Configuration for one dashboard instance.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// REST API root, e.g. `http://localhost:3000/api`.
    pub api_url: Url,
    /// Event stream path relative to `api_url`.
    pub stream_path: String,
    /// Total timeout for one REST request.
    pub timeout: Duration,
    /// Connect timeout, shared by REST and the stream.
    pub connect_timeout: Duration,
    /// Accept self-signed TLS certificates.
    pub accept_invalid_certs: bool,
    /// Self-refresh period of the present roster. Zero disables it.
    pub present_refresh_interval: Duration,
    pub reconnect: ReconnectPolicy,
    /// Buffer size of the notification broadcast channel.
    pub notification_capacity: usize,
    /// Attendance filters in effect when the dashboard mounts.
    pub initial_filters: AttendanceFilters,
}

impl DashboardConfig {
    /// Defaults for everything except the API root.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            stream_path: "stream".into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
            present_refresh_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            notification_capacity: 64,
            initial_filters: AttendanceFilters::default(),
        }
    }

    /// Parse `api_url` and apply defaults for the rest.
    pub fn from_url(api_url: &str) -> Result<Self, CoreError> {
        let url = Url::parse(api_url).map_err(|e| CoreError::Config {
            message: format!("invalid API URL '{api_url}': {e}"),
        })?;
        Ok(Self::new(url))
    }

    /// Absolute URL of the event stream.
    pub fn stream_url(&self) -> Result<Url, CoreError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        let path = self.stream_path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|e| CoreError::Config {
            message: format!("invalid stream URL: {e}"),
        })
    }

    /// Transport settings for the api crate's clients.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

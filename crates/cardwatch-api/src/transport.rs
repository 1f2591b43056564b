// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the event-stream connector share user agent,
// connect timeout and TLS settings through this module. They differ only
// in the total request timeout: a long-lived stream must not have one.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("cardwatch/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Total timeout for a single REST request.
    pub timeout: Duration,
    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Accept self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for request/response calls.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    /// Build a `reqwest::Client` for the server-push stream.
    ///
    /// Only the connect phase is bounded; the response body stays open
    /// for as long as the server keeps it open.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT);

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
    }
}

// Attendance backend REST client
//
// Wraps `reqwest::Client` with base-URL joining, status checking and
// JSON decoding. Endpoint methods live here too; the surface is small
// enough not to warrant per-resource files.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    Attendance, AttendanceFilters, CreateUserRequest, HealthStatus, PresentUser,
    UpdateUserRequest, User,
};
use crate::transport::TransportConfig;

/// The backend's error body: `{"error": "..."}`.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the attendance backend's REST endpoints.
///
/// `base_url` is the API root, e.g. `http://localhost:3000/api`; every
/// endpoint path is appended to it.
#[derive(Debug, Clone)]
pub struct AttendanceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AttendanceClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join an endpoint path onto the API root.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Health ───────────────────────────────────────────────────────

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let url = self.api_url("health")?;
        self.get(url, "Backend not available").await
    }

    // ── Users ────────────────────────────────────────────────────────

    /// `GET /users`
    pub async fn list_users(&self) -> Result<Vec<User>, Error> {
        let url = self.api_url("users")?;
        self.get(url, "Failed to fetch users").await
    }

    /// `POST /users`
    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<User, Error> {
        let url = self.api_url("users")?;
        debug!("POST {}", url);
        let resp = self.http.post(url).json(req).send().await?;
        Self::decode(Self::check(resp, "Failed to create user").await?).await
    }

    /// `PUT /users/{id}`
    pub async fn update_user(&self, id: i64, req: &UpdateUserRequest) -> Result<User, Error> {
        let url = self.api_url(&format!("users/{id}"))?;
        self.put(url, req, "Failed to update user").await
    }

    /// `DELETE /users/{id}`
    pub async fn delete_user(&self, id: i64) -> Result<(), Error> {
        let url = self.api_url(&format!("users/{id}"))?;
        debug!("DELETE {}", url);
        let resp = self.http.delete(url).send().await?;
        Self::check(resp, "Failed to delete user").await?;
        Ok(())
    }

    // ── Attendance ───────────────────────────────────────────────────

    /// `GET /attendance?date=&from=&to=`
    pub async fn list_attendance(
        &self,
        filters: &AttendanceFilters,
    ) -> Result<Vec<Attendance>, Error> {
        let mut url = self.api_url("attendance")?;
        let query = filters.to_query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        self.get(url, "Failed to fetch attendance").await
    }

    /// `GET /present`
    pub async fn list_present(&self) -> Result<Vec<PresentUser>, Error> {
        let url = self.api_url("present")?;
        self.get(url, "Failed to fetch present users").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url, fallback: &str) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        Self::decode(Self::check(resp, fallback).await?).await
    }

    async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
        fallback: &str,
    ) -> Result<T, Error> {
        debug!("PUT {}", url);
        let resp = self.http.put(url).json(body).send().await?;
        Self::decode(Self::check(resp, fallback).await?).await
    }

    /// Map non-2xx responses to `Error::Http`, preferring the backend's
    /// own error message over `fallback`.
    async fn check(resp: reqwest::Response, fallback: &str) -> Result<reqwest::Response, Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_owned());

        Err(Error::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}

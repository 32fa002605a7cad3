//! HTTP collaborator for the license dashboard backend.
//!
//! [`ApiClient`] is the [`HttpCollaborator`] the dashboard store runs its
//! actions through. It resolves action paths against a base URL, carries the
//! session id in the `Authorization` header and maps every response into the
//! store's success or [`TransportError`] shape.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use dashboard_api::{ApiClient, SessionSource};
//! use dashboard_store::{dashboard_store, ActionId, ErrorScope};
//!
//! let client = ApiClient::new("http://localhost:5000/", Duration::from_secs(30))?
//!     .with_session(SessionSource::File("/var/lib/dashboard/session".into()));
//!
//! let store = dashboard_store(client, ErrorScope::PerModule)?;
//! store.dispatch(ActionId::FetchAccounts, None).await?;
//! ```

pub mod error;
pub mod session;

pub use error::{ApiError, Result};
pub use session::SessionSource;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashboard_store::{ApiResponse, Filter, HttpCollaborator, TransportError};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// reqwest-backed client for the `ssoapi/*` endpoints.
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    session: SessionSource,
    authorization: RwLock<Option<HeaderValue>>,
}

impl ApiClient {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// A base URL without a trailing slash is treated as a directory, so
    /// `http://host/api` and `http://host/api/` resolve paths the same way.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            session: SessionSource::None,
            authorization: RwLock::new(None),
        })
    }

    /// Read credentials from `session` on every header refresh.
    pub fn with_session(mut self, session: SessionSource) -> Self {
        self.session = session;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The `Authorization` value attached to outgoing requests, if any.
    pub fn authorization(&self) -> Option<String> {
        self.read_authorization()
            .as_ref()
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    fn url_for(&self, path: &str) -> std::result::Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::network(path, format!("invalid request path: {e}")))
    }

    async fn send(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let start = Instant::now();

        let authorization = self.read_authorization().clone();
        let request = match authorization {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            warn!(path, error = %e, "dashboard API request failed");
            TransportError::network(path, e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(path, status = %status, error = %e, "failed to read dashboard API response");
            TransportError::network(path, e.to_string())
        })?;

        debug!(
            path,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis(),
            "dashboard API response"
        );

        if status.is_success() {
            Ok(ApiResponse::new(success_body(&body)))
        } else {
            Err(failure(path, status.as_u16(), &body))
        }
    }

    fn read_authorization(&self) -> RwLockReadGuard<'_, Option<HeaderValue>> {
        match self.authorization.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("authorization lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_authorization(&self) -> RwLockWriteGuard<'_, Option<HeaderValue>> {
        match self.authorization.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("authorization lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl HttpCollaborator for ApiClient {
    async fn get(&self, path: &str) -> std::result::Result<ApiResponse, TransportError> {
        let url = self.url_for(path)?;
        self.send(path, self.http_client.get(url)).await
    }

    async fn post(
        &self,
        path: &str,
        body: Option<&Filter>,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let url = self.url_for(path)?;
        // The backend parses the body unconditionally, so no filter is `{}`.
        let body = body.map(Filter::to_value).unwrap_or_else(|| Value::Object(Default::default()));
        self.send(path, self.http_client.post(url).json(&body)).await
    }

    fn set_header(&self) {
        let session = match self.session.read() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "could not read session, sending requests unauthenticated");
                None
            }
        };

        let value = session.and_then(|id| match HeaderValue::from_str(&id) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "session id is not a valid header value, ignoring it");
                None
            }
        });

        debug!(authenticated = value.is_some(), "authorization header refreshed");
        *self.write_authorization() = value;
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|source| ApiError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ApiError::CannotBeABase(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// JSON bodies are returned as parsed; anything else (the SSO link endpoint
/// answers in plain text) becomes a JSON string. An empty body is `null`.
fn success_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Non-2xx responses carry the body's `errors` field, or `null` when there is
/// none.
fn failure(path: &str, status: u16, body: &str) -> TransportError {
    let errors = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| parsed.get("errors").cloned())
        .unwrap_or(Value::Null);
    TransportError::new(path, Some(status), errors)
}

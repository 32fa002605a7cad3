//! The HTTP collaborator contract consumed by actions.
//!
//! Transport is not part of the container. Actions reach the backend only
//! through [`HttpCollaborator`], which resolves with a wrapped payload or
//! fails with a [`TransportError`]. Timeouts, retries at the socket level and
//! base URL handling all belong to the implementation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Filter;
use crate::error::TransportError;

/// Successful backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub data: Value,
}

impl ApiResponse {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

/// Authenticated transport used by actions.
///
/// # Example
///
/// ```ignore
/// struct Fixed;
///
/// #[async_trait]
/// impl HttpCollaborator for Fixed {
///     async fn get(&self, _path: &str) -> Result<ApiResponse, TransportError> {
///         Ok(ApiResponse::new(json!({"link": "https://sso.example/abc"})))
///     }
///
///     async fn post(&self, path: &str, _body: Option<&Filter>) -> Result<ApiResponse, TransportError> {
///         Err(TransportError::new(path, Some(404), Value::Null))
///     }
///
///     fn set_header(&self) {}
/// }
/// ```
#[async_trait]
pub trait HttpCollaborator: Send + Sync + 'static {
    /// Issue a GET request.
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError>;

    /// Issue a POST request with an optional JSON body.
    async fn post(&self, path: &str, body: Option<&Filter>) -> Result<ApiResponse, TransportError>;

    /// Refresh the authorization header from persisted credentials.
    ///
    /// Synchronous and infallible from the container's point of view.
    fn set_header(&self);
}

#[async_trait]
impl<T: HttpCollaborator + ?Sized> HttpCollaborator for Arc<T> {
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        (**self).get(path).await
    }

    async fn post(&self, path: &str, body: Option<&Filter>) -> Result<ApiResponse, TransportError> {
        (**self).post(path, body).await
    }

    fn set_header(&self) {
        (**self).set_header()
    }
}

/// HTTP verb of an action's backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// Verb and relative path of one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
}

impl Endpoint {
    pub const fn get(path: &'static str) -> Self {
        Self {
            method: Method::Get,
            path,
        }
    }

    pub const fn post(path: &'static str) -> Self {
        Self {
            method: Method::Post,
            path,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

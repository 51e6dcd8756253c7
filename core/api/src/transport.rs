//! Transport trait definition.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

use passvault_common::Secret;

/// One outgoing request, relative to the service base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Session token to send as a bearer credential.
    pub bearer: Option<Secret>,
}

/// A response as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// `Content-Disposition` header, if present.
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// A JSON response with the given status.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_disposition: None,
            body: body.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON. An empty body reads as `null`.
    pub fn json_body(&self) -> Option<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Some(Value::Null);
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Failure to obtain any response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

/// Carrier for API requests.
///
/// Implementations only move bytes; status interpretation and session
/// handling belong to the gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return whatever the server answered.
    ///
    /// # Errors
    /// - `TransportError` when no response was received
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

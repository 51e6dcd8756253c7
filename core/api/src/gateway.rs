//! Authenticated access to the service API.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use passvault_common::{Error, ItemId, Result};
use passvault_session::SessionStore;

use crate::envelope::Envelope;
use crate::transport::{ApiRequest, RawResponse, Transport};

/// Characters left as-is in a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// `/vault/{id}` with the id percent-encoded.
pub fn item_path(id: &ItemId) -> String {
    format!("/vault/{}", utf8_percent_encode(id.as_str(), SEGMENT))
}

/// Extract the `message` field of a JSON error body.
fn error_message(response: &RawResponse) -> Option<String> {
    response
        .json_body()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// The only component that talks to the service.
///
/// Sends the current session token as a bearer credential. A 401 on an
/// authenticated request clears the session and yields `SessionExpired`.
pub struct ApiGateway {
    transport: Arc<dyn Transport>,
    store: Arc<SessionStore>,
}

impl ApiGateway {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<SessionStore>) -> Self {
        Self { transport, store }
    }

    /// Session store this gateway authenticates with.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Send a request and return the raw successful response.
    ///
    /// # Errors
    /// - `Network` when no response arrived
    /// - `SessionExpired` on 401 with a session (the session is cleared)
    /// - `Api` for any other non-2xx status
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<RawResponse> {
        let bearer = self.store.current().await.map(|s| s.token().clone());
        let authenticated = bearer.is_some();

        let request = ApiRequest {
            method: method.clone(),
            path: path.to_string(),
            body,
            bearer,
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} {} failed: {}", method, path, e);
                return Err(Error::Network(e.to_string()));
            }
        };
        debug!("{} {} -> {}", method, path, response.status);

        if response.status == 401 && authenticated {
            warn!("Server rejected the session token, clearing session");
            if let Err(e) = self.store.clear().await {
                warn!("Failed to clear session storage: {}", e);
            }
            return Err(Error::SessionExpired);
        }

        if !response.is_success() {
            return Err(Error::Api {
                status: response.status,
                message: error_message(&response),
            });
        }

        Ok(response)
    }

    /// Send a request and return its JSON body (`null` when empty).
    ///
    /// # Errors
    /// - As [`Self::request_raw`]
    /// - `InvalidFormat` when a successful body is not JSON
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let response = self.request_raw(method, path, body).await?;
        response
            .json_body()
            .ok_or_else(|| Error::InvalidFormat(format!("response to {} is not JSON", path)))
    }

    /// Send a request and unwrap the envelope's `data` as `T`.
    ///
    /// # Errors
    /// - As [`Self::request`]
    /// - `Api` when the envelope reports `success: false`
    /// - `InvalidFormat` when `data` is missing or has the wrong shape
    pub async fn data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let (status, envelope) = self.envelope::<T>(method, path, body).await?;
        envelope.into_data(status)
    }

    /// Send a request whose envelope carries no payload of interest.
    ///
    /// # Errors
    /// - As [`Self::request`]
    /// - `Api` when the envelope reports `success: false`
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<()> {
        let (status, envelope) = self.envelope::<Value>(method, path, body).await?;
        envelope.check(status)
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(u16, Envelope<T>)> {
        let response = self.request_raw(method, path, body).await?;
        let envelope = serde_json::from_slice(&response.body).map_err(|e| {
            Error::InvalidFormat(format!("unexpected response from {}: {}", path, e))
        })?;
        Ok((response.status, envelope))
    }
}

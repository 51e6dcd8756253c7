//! Scripted transport for testing.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::transport::{ApiRequest, RawResponse, Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
    Response(RawResponse),
    Unreachable(String),
}

#[derive(Debug, Default)]
struct MockState {
    replies: HashMap<(Method, String), VecDeque<Reply>>,
    requests: Vec<ApiRequest>,
}

/// Transport that replays queued responses and records every request.
///
/// Responses are queued per `(method, path)` and consumed in order. A
/// request with nothing queued gets a 404. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.lock()
            .replies
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a JSON response.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Reply::Response(RawResponse::json(status, &body)));
        self
    }

    /// Queue a successful envelope carrying `data`.
    pub fn respond_data(&self, method: Method, path: &str, data: Value) -> &Self {
        self.respond(method, path, 200, json!({"success": true, "data": data}))
    }

    /// Queue a response exactly as given.
    pub fn respond_raw(&self, method: Method, path: &str, response: RawResponse) -> &Self {
        self.push(method, path, Reply::Response(response));
        self
    }

    /// Queue a failure to reach the server.
    pub fn fail(&self, method: Method, path: &str, reason: &str) -> &Self {
        self.push(method, path, Reply::Unreachable(reason.to_string()));
        self
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Requests sent to `path` with `method`.
    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<ApiRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let mut state = self.lock();
        let key = (request.method.clone(), request.path.clone());
        state.requests.push(request);

        match state.replies.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Unreachable(reason)) => Err(TransportError::Connect(reason)),
            None => Ok(RawResponse::json(
                404,
                &json!({"success": false, "message": format!("no route for {} {}", key.0, key.1)}),
            )),
        }
    }
}

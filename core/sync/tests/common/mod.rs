//! Common test utilities for client integration tests.

pub mod fake_server;

pub use fake_server::{FakeServer, FakeUser};

use passvault_common::Secret;
use passvault_session::SessionStore;
use passvault_sync::VaultClient;
use std::sync::Arc;

/// Client over an in-memory session store talking to `server`.
pub fn client(server: &FakeServer) -> VaultClient {
    VaultClient::with_parts(Arc::new(SessionStore::in_memory()), Arc::new(server.clone()))
}

/// Client already logged in as `username`.
pub async fn logged_in(server: &FakeServer, username: &str) -> VaultClient {
    let client = client(server);
    client
        .auth()
        .login(username, &Secret::new(server.password_of(username)))
        .await
        .unwrap();
    client
}

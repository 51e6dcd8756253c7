//! Client entry point.

use std::sync::Arc;
use tracing::info;

use passvault_api::{ApiGateway, ClientConfig, HttpTransport, Transport};
use passvault_common::{Error, Result};
use passvault_session::{SessionStore, SqliteStore};

use crate::auth::AuthService;
use crate::share::ShareCoordinator;
use crate::transfer::ImportExportEngine;
use crate::vault::VaultSync;

/// All client services, sharing one session store and one gateway.
pub struct VaultClient {
    store: Arc<SessionStore>,
    auth: AuthService,
    vault: VaultSync,
    transfer: ImportExportEngine,
    shares: ShareCoordinator,
}

impl VaultClient {
    /// Open the persisted session under the data directory and connect to
    /// the configured service.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Data directory or session database cannot be opened
    pub fn open(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            Error::Storage(format!(
                "Failed to create data directory {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;
        let store = SessionStore::open(SqliteStore::open(config.session_db_path())?)?;
        let transport = HttpTransport::new(config)?;

        info!("Using server {}", transport.base_url());
        Ok(Self::with_parts(Arc::new(store), Arc::new(transport)))
    }

    /// Build a client from an existing store and transport.
    pub fn with_parts(store: Arc<SessionStore>, transport: Arc<dyn Transport>) -> Self {
        let gateway = Arc::new(ApiGateway::new(transport, store.clone()));
        Self {
            store,
            auth: AuthService::new(gateway.clone()),
            vault: VaultSync::new(gateway.clone()),
            transfer: ImportExportEngine::new(gateway.clone()),
            shares: ShareCoordinator::new(gateway),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn vault(&self) -> &VaultSync {
        &self.vault
    }

    pub fn transfer(&self) -> &ImportExportEngine {
        &self.transfer
    }

    pub fn shares(&self) -> &ShareCoordinator {
        &self.shares
    }
}

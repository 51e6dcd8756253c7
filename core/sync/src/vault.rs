//! Vault item cache and CRUD.
//!
//! The cache is never patched. It is replaced wholesale by a successful
//! `list()`, and every mutation ends with one.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use passvault_api::{item_path, ApiGateway, Method};
use passvault_common::{DraftKind, Error, ItemId, Result, VaultDraft, VaultItem};
use passvault_session::{SessionHandle, SessionStore};

/// Items fetched under one session.
struct Snapshot {
    handle: Option<SessionHandle>,
    items: Arc<Vec<VaultItem>>,
}

/// Client-side view of the user's vault.
pub struct VaultSync {
    gateway: Arc<ApiGateway>,
    cache: RwLock<Snapshot>,
}

impl VaultSync {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            gateway,
            cache: RwLock::new(Snapshot {
                handle: None,
                items: Arc::new(Vec::new()),
            }),
        }
    }

    fn session(&self) -> &Arc<SessionStore> {
        self.gateway.session()
    }

    /// Current snapshot. Empty when the session that fetched it is gone.
    pub async fn cached(&self) -> Arc<Vec<VaultItem>> {
        let snapshot = self.cache.read().await;
        if self.session().is_current(snapshot.handle.as_ref()).await {
            snapshot.items.clone()
        } else {
            Arc::new(Vec::new())
        }
    }

    /// Fetch all items and replace the cache with them.
    ///
    /// # Errors
    /// - Any gateway error; the cache is left untouched
    /// - `SessionChanged` if the session changed while the request was in flight
    pub async fn list(&self) -> Result<Arc<Vec<VaultItem>>> {
        let handle = self.session().handle().await;
        let items: Vec<VaultItem> = self.gateway.data(Method::GET, "/vault", None).await?;

        let mut cache = self.cache.write().await;
        if !self.session().is_current(handle.as_ref()).await {
            warn!("Discarding vault listing fetched for a previous session");
            return Err(Error::SessionChanged);
        }

        debug!("Vault cache replaced with {} items", items.len());
        let items = Arc::new(items);
        *cache = Snapshot {
            handle,
            items: items.clone(),
        };
        Ok(items)
    }

    /// Fetch one item. The cache is not touched.
    pub async fn get(&self, id: &ItemId) -> Result<VaultItem> {
        self.gateway.data(Method::GET, &item_path(id), None).await
    }

    /// Create an item and refresh the cache.
    ///
    /// With a cached plan, the item limit and password length are checked
    /// before any request is sent.
    ///
    /// # Errors
    /// - `InvalidInput` if the draft is invalid
    /// - `PlanLimitExceeded` if the cached plan forbids it
    /// - Gateway errors from the create or the follow-up listing
    pub async fn create(&self, draft: &VaultDraft) -> Result<VaultItem> {
        draft.validate(DraftKind::Create)?;

        if let Some(plan) = self.session().cached_plan().await {
            let count = self.cached().await.len();
            passvault_policy::check_add_item(&plan, count)?;
            passvault_policy::check_password(&plan, draft.secret.char_len())?;
        }

        let created: VaultItem = self
            .gateway
            .data(Method::POST, "/vault", Some(draft_body(draft)?))
            .await?;
        info!("Created vault item {}", display_id(&created));

        self.list().await?;
        Ok(created)
    }

    /// Update an item and refresh the cache.
    ///
    /// An empty secret in the draft leaves the stored password unchanged.
    ///
    /// # Errors
    /// - `InvalidInput` if the draft is invalid
    /// - `PlanLimitExceeded` if a new secret is longer than the cached plan allows
    /// - Gateway errors from the update or the follow-up listing
    pub async fn update(&self, id: &ItemId, draft: &VaultDraft) -> Result<VaultItem> {
        draft.validate(DraftKind::Update)?;

        if !draft.secret.is_empty() {
            if let Some(plan) = self.session().cached_plan().await {
                passvault_policy::check_password(&plan, draft.secret.char_len())?;
            }
        }

        let updated: VaultItem = self
            .gateway
            .data(Method::PUT, &item_path(id), Some(draft_body(draft)?))
            .await?;
        info!("Updated vault item {}", id);

        self.list().await?;
        Ok(updated)
    }

    /// Delete an item and refresh the cache.
    pub async fn delete(&self, id: &ItemId) -> Result<()> {
        self.gateway
            .send(Method::DELETE, &item_path(id), None)
            .await?;
        info!("Deleted vault item {}", id);

        self.list().await?;
        Ok(())
    }
}

fn draft_body(draft: &VaultDraft) -> Result<Value> {
    serde_json::to_value(draft).map_err(|e| Error::Serialization(e.to_string()))
}

fn display_id(item: &VaultItem) -> &str {
    item.id.as_ref().map(ItemId::as_str).unwrap_or("(no id)")
}

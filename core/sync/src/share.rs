//! Item sharing.

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use passvault_api::{ApiGateway, Method};
use passvault_common::{Error, ItemId, Result, SharedItem};

/// Shares items with other users and lists items shared with this one.
pub struct ShareCoordinator {
    gateway: Arc<ApiGateway>,
}

impl ShareCoordinator {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    /// Share an item with a user identified by username or email.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty recipient
    /// - `PlanLimitExceeded` if the cached plan has no sharing
    /// - Gateway errors
    pub async fn share(&self, id: &ItemId, recipient: &str, can_edit: bool) -> Result<()> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(Error::InvalidInput(
                "Recipient username or email is required".to_string(),
            ));
        }

        if let Some(plan) = self.gateway.session().cached_plan().await {
            passvault_policy::check_share(&plan)?;
        }

        let body = json!({
            "vaultItemId": id,
            "sharedWithUsernameOrEmail": recipient,
            "canEdit": can_edit,
        });
        self.gateway
            .send(Method::POST, "/vault/share", Some(body))
            .await?;

        info!("Shared vault item {}", id);
        Ok(())
    }

    /// Items other users have shared with the current user.
    pub async fn received(&self) -> Result<Vec<SharedItem>> {
        self.gateway
            .data(Method::GET, "/vault/share/received", None)
            .await
    }
}

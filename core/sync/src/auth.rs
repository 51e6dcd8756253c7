//! Login, logout and plan refresh.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use passvault_api::{ApiGateway, Method};
use passvault_common::{Error, PlanDescriptor, PlanLimits, Result, Secret, UserId};
use passvault_session::{Session, SessionStore};

/// Plan name used when the server sends limits without a name.
const UNKNOWN_PLAN: &str = "Unknown";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    token: Option<String>,
    user_id: Option<UserId>,
    plan_limits: Option<PlanLimits>,
    service_plan_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanData {
    name: Option<String>,
    limits: Option<PlanLimits>,
}

/// Establishes and tears down sessions.
pub struct AuthService {
    gateway: Arc<ApiGateway>,
}

impl AuthService {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    fn store(&self) -> &Arc<SessionStore> {
        self.gateway.session()
    }

    /// Log in and establish a new session, replacing any existing one.
    ///
    /// When the response carries no plan limits, the plan is fetched
    /// separately; failing that is logged and the login still succeeds.
    ///
    /// # Errors
    /// - `InvalidInput` for empty credentials
    /// - `Api` when the server refuses the credentials
    /// - `InvalidFormat` when the response lacks a token or user id
    /// - Storage errors while persisting the session
    pub async fn login(&self, username: &str, password: &Secret) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }

        self.store().clear().await?;

        let body = json!({ "username": username, "password": password.expose() });
        let data: LoginData = self
            .gateway
            .data(Method::POST, "/auth/login", Some(body))
            .await?;

        let token = data
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidFormat("login response has no token".to_string()))?;
        let user_id = data
            .user_id
            .ok_or_else(|| Error::InvalidFormat("login response has no user id".to_string()))?;
        let plan = data.plan_limits.map(|limits| {
            let name = data
                .service_plan_name
                .unwrap_or_else(|| UNKNOWN_PLAN.to_string());
            PlanDescriptor::from_limits(name, &limits)
        });
        let has_plan = plan.is_some();

        let session = self
            .store()
            .establish(Secret::new(token), user_id, plan)
            .await?;
        info!("Logged in as {}", username);

        if !has_plan {
            if let Err(e) = self.refresh_plan().await {
                warn!("Could not load plan after login: {}", e);
            }
        }

        Ok(session)
    }

    /// Drop the session locally. The server is not contacted.
    pub async fn logout(&self) -> Result<()> {
        self.store().clear().await
    }

    /// Fetch the plan and cache it for the session that asked for it.
    ///
    /// # Errors
    /// - `NotAuthenticated` without a session
    /// - `SessionChanged` if the session changed before the response arrived
    /// - Gateway errors
    pub async fn refresh_plan(&self) -> Result<PlanDescriptor> {
        let handle = self.store().handle().await.ok_or(Error::NotAuthenticated)?;

        let data: PlanData = self.gateway.data(Method::GET, "/user/plan", None).await?;
        let plan = PlanDescriptor::from_limits(
            data.name.unwrap_or_else(|| UNKNOWN_PLAN.to_string()),
            &data.limits.unwrap_or_default(),
        );

        self.store().cache_plan_for(&handle, plan.clone()).await?;
        info!("Plan refreshed: {}", plan.name);
        Ok(plan)
    }
}

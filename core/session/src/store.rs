//! Authenticated session state.
//!
//! The [`SessionStore`] owns the current session and the cached plan
//! descriptor. It is created once per client and shared by `Arc`; the API
//! gateway reads it on every request, and login, logout, plan refresh and
//! the gateway's 401 teardown write it.

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use passvault_common::{Error, PlanDescriptor, Result, Secret, UserId};

use crate::kv::{KeyValueStore, MemoryStore};

const KEY_TOKEN: &str = "token";
const KEY_USER_ID: &str = "user_id";
const KEY_CREATED_AT: &str = "created_at";
const KEY_PLAN: &str = "plan";

const ALL_KEYS: [&str; 4] = [KEY_TOKEN, KEY_USER_ID, KEY_CREATED_AT, KEY_PLAN];

/// In-process identity of one established session.
///
/// Requests capture the handle when issued; results that come back after the
/// session changed can then be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a new unique session handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    handle: SessionHandle,
    token: Secret,
    user_id: UserId,
    created_locally: DateTime<Utc>,
}

impl Session {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Bearer token. Never log it.
    pub fn token(&self) -> &Secret {
        &self.token
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// When this client established the session.
    pub fn created_locally(&self) -> DateTime<Utc> {
        self.created_locally
    }
}

#[derive(Debug, Clone)]
struct State {
    session: Session,
    plan: Option<PlanDescriptor>,
}

/// Owner of the session and cached plan, persisted through a
/// [`KeyValueStore`].
///
/// Writes hit storage before memory, so a failed write never changes what
/// readers see. Both `establish` and `clear` replace the whole state under
/// one write lock, so a partial session is never observable.
pub struct SessionStore {
    backend: Mutex<Box<dyn KeyValueStore>>,
    state: RwLock<Option<State>>,
}

impl SessionStore {
    /// Open a store over `backend`, restoring any persisted session.
    ///
    /// A persisted record missing its token or user id is treated as absent
    /// and its leftovers are removed.
    ///
    /// # Errors
    /// - Storage read/write failure
    pub fn open(backend: impl KeyValueStore + 'static) -> Result<Self> {
        let mut backend: Box<dyn KeyValueStore> = Box::new(backend);
        let state = load_state(backend.as_mut())?;

        match &state {
            Some(s) => info!(
                "Restored session for user {} from {} store",
                s.session.user_id,
                backend.name()
            ),
            None => info!("No persisted session in {} store", backend.name()),
        }

        Ok(Self {
            backend: Mutex::new(backend),
            state: RwLock::new(state),
        })
    }

    /// A store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            backend: Mutex::new(Box::new(MemoryStore::new())),
            state: RwLock::new(None),
        }
    }

    /// Set all session fields at once, replacing any prior session.
    ///
    /// Without a plan descriptor the cached plan is unset until refreshed.
    ///
    /// # Errors
    /// - Storage write failure; the previous state stays visible
    pub async fn establish(
        &self,
        token: Secret,
        user_id: UserId,
        plan: Option<PlanDescriptor>,
    ) -> Result<Session> {
        let session = Session {
            handle: SessionHandle::new(),
            token,
            user_id,
            created_locally: Utc::now(),
        };

        let mut state = self.state.write().await;

        let mut puts = vec![
            (KEY_TOKEN, session.token.expose().to_string()),
            (KEY_USER_ID, session.user_id.as_str().to_string()),
            (KEY_CREATED_AT, session.created_locally.to_rfc3339()),
        ];
        let mut removals = Vec::new();
        match &plan {
            Some(p) => puts.push((KEY_PLAN, encode_plan(p)?)),
            None => removals.push(KEY_PLAN),
        }
        self.backend.lock().await.write(&puts, &removals)?;

        *state = Some(State {
            session: session.clone(),
            plan,
        });
        info!("Session established for user {}", session.user_id);

        Ok(session)
    }

    /// Read-only snapshot of the current session.
    pub async fn current(&self) -> Option<Session> {
        self.state.read().await.as_ref().map(|s| s.session.clone())
    }

    /// Handle of the current session, if any.
    pub async fn handle(&self) -> Option<SessionHandle> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.session.handle.clone())
    }

    /// Whether `handle` still names the current session.
    pub async fn is_current(&self, handle: Option<&SessionHandle>) -> bool {
        self.handle().await.as_ref() == handle
    }

    /// Remove the session and the cached plan. A no-op without a session.
    ///
    /// The in-memory state is dropped before storage is touched, so even a
    /// storage failure leaves no visible session.
    ///
    /// # Errors
    /// - Storage write failure
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let had_session = state.take().is_some();

        self.backend.lock().await.write(&[], &ALL_KEYS)?;
        if had_session {
            info!("Session cleared");
        }
        Ok(())
    }

    /// Cached plan descriptor, if any.
    pub async fn cached_plan(&self) -> Option<PlanDescriptor> {
        self.state.read().await.as_ref().and_then(|s| s.plan.clone())
    }

    /// Cache a plan descriptor for the current session.
    ///
    /// # Errors
    /// - `NotAuthenticated` without a session
    /// - Storage write failure
    pub async fn cache_plan(&self, plan: PlanDescriptor) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state.as_mut().ok_or(Error::NotAuthenticated)?;
        self.backend
            .lock()
            .await
            .write(&[(KEY_PLAN, encode_plan(&plan)?)], &[])?;
        current.plan = Some(plan);
        Ok(())
    }

    /// Cache a plan fetched while `handle` was the current session.
    ///
    /// # Errors
    /// - `SessionChanged` if the session was replaced or cleared since
    /// - `NotAuthenticated` without a session
    /// - Storage write failure
    pub async fn cache_plan_for(&self, handle: &SessionHandle, plan: PlanDescriptor) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state.as_mut().ok_or(Error::NotAuthenticated)?;
        if &current.session.handle != handle {
            warn!("Discarding plan fetched for a previous session");
            return Err(Error::SessionChanged);
        }
        self.backend
            .lock()
            .await
            .write(&[(KEY_PLAN, encode_plan(&plan)?)], &[])?;
        current.plan = Some(plan);
        Ok(())
    }
}

fn encode_plan(plan: &PlanDescriptor) -> Result<String> {
    serde_json::to_string(plan).map_err(|e| Error::Serialization(e.to_string()))
}

fn load_state(backend: &mut dyn KeyValueStore) -> Result<Option<State>> {
    let token = backend.get(KEY_TOKEN)?;
    let user_id = backend.get(KEY_USER_ID)?;

    let (token, user_id) = match (token, user_id) {
        (Some(t), Some(u)) if !t.is_empty() => match UserId::new(u) {
            Ok(user_id) => (Secret::new(t), user_id),
            Err(_) => return wipe_partial(backend),
        },
        (None, None) => {
            if backend.get(KEY_PLAN)?.is_some() || backend.get(KEY_CREATED_AT)?.is_some() {
                return wipe_partial(backend);
            }
            return Ok(None);
        }
        _ => return wipe_partial(backend),
    };

    let created_locally = backend
        .get(KEY_CREATED_AT)?
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let plan = match backend.get(KEY_PLAN)? {
        Some(raw) => match serde_json::from_str::<PlanDescriptor>(&raw) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!("Ignoring unreadable cached plan: {}", e);
                None
            }
        },
        None => None,
    };

    Ok(Some(State {
        session: Session {
            handle: SessionHandle::new(),
            token,
            user_id,
            created_locally,
        },
        plan,
    }))
}

fn wipe_partial(backend: &mut dyn KeyValueStore) -> Result<Option<State>> {
    warn!("Discarding incomplete persisted session");
    backend.write(&[], &ALL_KEYS)?;
    Ok(None)
}

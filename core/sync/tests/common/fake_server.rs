//! Stateful in-process stand-in for the PassVault service.
//!
//! Implements enough of the REST API to drive the client end to end:
//! login, plan lookup, item CRUD, export, import and sharing. Item secrets
//! are kept server-side so tests can check what the client actually sent.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use passvault_api::{ApiRequest, Method, RawResponse, Transport, TransportError};
use passvault_session::SessionStore;

const TIMESTAMP: &str = "2024-05-01T12:00:00";

/// Account known to the fake server.
#[derive(Debug, Clone)]
pub struct FakeUser {
    pub username: String,
    pub password: String,
    pub plan_name: String,
    pub limits: Value,
    /// Whether the login response carries `planLimits`.
    pub limits_in_login: bool,
}

impl FakeUser {
    pub fn premium(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: format!("{}-pw", username),
            plan_name: "Premium".to_string(),
            limits: json!({
                "maxVaultItems": 100,
                "maxPasswordLength": 64,
                "canExport": true,
                "canImport": true,
                "canShare": true
            }),
            limits_in_login: true,
        }
    }

    pub fn free(username: &str) -> Self {
        Self {
            plan_name: "Free".to_string(),
            limits: json!({
                "maxVaultItems": 2,
                "maxPasswordLength": 16,
                "canExport": false,
                "canImport": false,
                "canShare": false
            }),
            ..Self::premium(username)
        }
    }
}

struct StoredItem {
    owner: u64,
    fields: Map<String, Value>,
    password: String,
}

struct Share {
    item: u64,
    from: u64,
    to: u64,
    can_edit: bool,
}

#[derive(Default)]
struct State {
    users: Vec<FakeUser>,
    tokens: HashMap<String, u64>,
    items: BTreeMap<u64, StoredItem>,
    shares: Vec<Share>,
    next_id: u64,
    next_token: u64,
    requests: Vec<ApiRequest>,
    export_failure: Option<String>,
    import_rejects: Vec<String>,
    logout_during_list: Option<Arc<SessionStore>>,
}

/// In-process service. Clones share state.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

fn ok(data: Value) -> RawResponse {
    RawResponse::json(200, &json!({ "success": true, "data": data }))
}

fn ok_empty() -> RawResponse {
    RawResponse::json(200, &json!({ "success": true }))
}

fn fail(status: u16, message: &str) -> RawResponse {
    RawResponse::json(status, &json!({ "success": false, "message": message }))
}

fn limit(user: &FakeUser, key: &str) -> Value {
    user.limits.get(key).cloned().unwrap_or(Value::Null)
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_user(&self, user: FakeUser) -> &Self {
        self.lock().users.push(user);
        self
    }

    pub fn password_of(&self, username: &str) -> String {
        self.lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.password.clone())
            .unwrap_or_default()
    }

    /// Change a user's limits server-side without the client knowing.
    pub fn set_limits(&self, username: &str, limits: Value) {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.username == username) {
            user.limits = limits;
        }
    }

    /// Invalidate every issued token.
    pub fn expire_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// Make the export endpoint answer `{success: false, message}` with 200.
    pub fn fail_export_with(&self, message: &str) {
        self.lock().export_failure = Some(message.to_string());
    }

    /// Reject imported items with this title.
    pub fn reject_import_title(&self, title: &str) {
        self.lock().import_rejects.push(title.to_string());
    }

    /// Clear `store` while the next `GET /vault` is in flight.
    pub fn logout_during_next_list(&self, store: Arc<SessionStore>) {
        self.lock().logout_during_list = Some(store);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Secret stored for an item, as last written by the client.
    pub fn stored_secret(&self, id: &str) -> Option<String> {
        let id: u64 = id.parse().ok()?;
        self.lock().items.get(&id).map(|i| i.password.clone())
    }

    fn handle(&self, request: &ApiRequest) -> RawResponse {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let method = &request.method;
        let path = request.path.as_str();
        let body = request.body.clone().unwrap_or(Value::Null);

        if *method == Method::POST && path == "/auth/login" {
            return state.login(&body);
        }

        let user_id = match request
            .bearer
            .as_ref()
            .and_then(|t| state.tokens.get(t.expose()).copied())
        {
            Some(id) => id,
            None => return fail(401, "Unauthorized"),
        };

        let item_id = path
            .strip_prefix("/vault/")
            .and_then(|id| id.parse::<u64>().ok());

        match (method.as_str(), path) {
            ("GET", "/user/plan") => {
                let user = state.user(user_id);
                ok(json!({ "name": user.plan_name, "limits": user.limits }))
            }
            ("GET", "/vault") => ok(Value::Array(state.list(user_id))),
            ("POST", "/vault") => state.create(user_id, &body),
            ("GET", "/vault/export/download") => state.export(user_id),
            ("POST", "/vault/import") => state.import(user_id, &body),
            ("POST", "/vault/share") => state.share(user_id, &body),
            ("GET", "/vault/share/received") => state.received(user_id),
            (m, _) => match (m, item_id) {
                ("GET", Some(id)) => state.get(user_id, id),
                ("PUT", Some(id)) => state.update(user_id, id, &body),
                ("DELETE", Some(id)) => state.delete(user_id, id),
                _ => fail(404, "Not found"),
            },
        }
    }
}

impl State {
    fn user(&self, id: u64) -> &FakeUser {
        &self.users[id as usize - 1]
    }

    fn user_id_by_name(&self, name: &str) -> Option<u64> {
        self.users
            .iter()
            .position(|u| u.username == name)
            .map(|i| i as u64 + 1)
    }

    fn login(&mut self, body: &Value) -> RawResponse {
        let username = body["username"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();

        let Some(id) = self.user_id_by_name(username) else {
            return fail(401, "Invalid username or password");
        };
        let user = self.user(id).clone();
        if user.password != password {
            return fail(401, "Invalid username or password");
        }

        self.next_token += 1;
        let token = format!("token-{}", self.next_token);
        self.tokens.insert(token.clone(), id);

        let mut data = json!({ "token": token, "userId": id, "username": username });
        if user.limits_in_login {
            data["planLimits"] = user.limits.clone();
            data["servicePlanName"] = json!(user.plan_name);
        }
        ok(data)
    }

    fn render(&self, id: u64, item: &StoredItem) -> Value {
        let mut fields = item.fields.clone();
        fields.insert("id".to_string(), json!(id));
        fields.insert("userId".to_string(), json!(item.owner));
        Value::Object(fields)
    }

    fn list(&self, user_id: u64) -> Vec<Value> {
        self.items
            .iter()
            .filter(|(_, item)| item.owner == user_id)
            .map(|(id, item)| self.render(*id, item))
            .collect()
    }

    fn insert(&mut self, user_id: u64, body: &Value) -> Result<u64, String> {
        let user = self.user(user_id).clone();
        let title = body["title"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();

        if title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if password.is_empty() {
            return Err("Password is required".to_string());
        }
        let count = self.items.values().filter(|i| i.owner == user_id).count() as u64;
        let max_items = limit(&user, "maxVaultItems").as_u64().unwrap_or(0);
        if count >= max_items {
            return Err(format!(
                "Maximum vault items limit ({}) reached for your plan. Please upgrade.",
                max_items
            ));
        }
        let max_len = limit(&user, "maxPasswordLength").as_u64().unwrap_or(0);
        if password.chars().count() as u64 > max_len {
            return Err(format!(
                "Password exceeds the maximum length of {} characters for your plan",
                max_len
            ));
        }

        let mut fields = Map::new();
        for key in ["title", "username", "url", "notes", "folder", "tags", "isFavorite"] {
            if let Some(v) = body.get(key).filter(|v| !v.is_null()) {
                fields.insert(key.to_string(), v.clone());
            }
        }
        fields.insert("createdAt".to_string(), json!(TIMESTAMP));
        fields.insert("updatedAt".to_string(), json!(TIMESTAMP));

        self.next_id += 1;
        let id = self.next_id;
        self.items.insert(
            id,
            StoredItem {
                owner: user_id,
                fields,
                password: password.to_string(),
            },
        );
        Ok(id)
    }

    fn create(&mut self, user_id: u64, body: &Value) -> RawResponse {
        match self.insert(user_id, body) {
            Ok(id) => ok(self.render(id, &self.items[&id])),
            Err(message) => fail(403, &message),
        }
    }

    fn get(&self, user_id: u64, id: u64) -> RawResponse {
        match self.items.get(&id) {
            Some(item) if item.owner == user_id => ok(self.render(id, item)),
            _ => fail(404, "Vault item not found"),
        }
    }

    fn update(&mut self, user_id: u64, id: u64, body: &Value) -> RawResponse {
        let Some(item) = self.items.get_mut(&id).filter(|i| i.owner == user_id) else {
            return fail(404, "Vault item not found");
        };
        for key in ["title", "username", "url", "notes", "folder", "tags", "isFavorite"] {
            match body.get(key) {
                Some(v) if !v.is_null() => {
                    item.fields.insert(key.to_string(), v.clone());
                }
                _ => {
                    item.fields.remove(key);
                }
            }
        }
        if let Some(password) = body["password"].as_str().filter(|p| !p.is_empty()) {
            item.password = password.to_string();
        }
        item.fields
            .insert("updatedAt".to_string(), json!("2024-05-02T08:30:00"));
        ok(self.render(id, &self.items[&id]))
    }

    fn delete(&mut self, user_id: u64, id: u64) -> RawResponse {
        match self.items.get(&id) {
            Some(item) if item.owner == user_id => {
                self.items.remove(&id);
                self.shares.retain(|s| s.item != id);
                ok_empty()
            }
            _ => fail(404, "Vault item not found"),
        }
    }

    fn export(&self, user_id: u64) -> RawResponse {
        if let Some(message) = &self.export_failure {
            return fail(200, message);
        }
        let user = self.user(user_id);
        if limit(user, "canExport") != json!(true) {
            return fail(200, "Export is not available for your plan. Please upgrade to Usual or Premium.");
        }

        let items: Vec<Value> = self
            .items
            .iter()
            .filter(|(_, item)| item.owner == user_id)
            .map(|(id, item)| {
                let mut v = self.render(*id, item);
                v["password"] = json!(item.password);
                v
            })
            .collect();
        let document = json!({
            "userId": user_id,
            "username": user.username,
            "exportDate": TIMESTAMP,
            "itemCount": items.len(),
            "items": items,
        });

        RawResponse {
            status: 200,
            content_disposition: Some("attachment; filename=\"vault-export.json\"".to_string()),
            body: document.to_string().into_bytes(),
        }
    }

    fn import(&mut self, user_id: u64, body: &Value) -> RawResponse {
        if limit(self.user(user_id), "canImport") != json!(true) {
            return fail(403, "Import is not available for your plan. Please upgrade to Premium.");
        }
        let Some(items) = body["items"].as_array() else {
            return fail(400, "Invalid import format");
        };

        let mut imported = 0;
        let mut errors = Vec::new();
        for item in items {
            let title = item["title"].as_str().unwrap_or("null").to_string();
            let outcome = if self.import_rejects.contains(&title) {
                Err("Rejected by server".to_string())
            } else {
                self.insert(user_id, item)
            };
            match outcome {
                Ok(_) => imported += 1,
                Err(reason) => errors.push(json!(format!(
                    "Failed to import item: {} - {}",
                    title, reason
                ))),
            }
        }

        ok(json!({
            "importedCount": imported,
            "errorCount": errors.len(),
            "errors": errors,
        }))
    }

    fn share(&mut self, user_id: u64, body: &Value) -> RawResponse {
        if limit(self.user(user_id), "canShare") != json!(true) {
            return fail(403, "Sharing is not available for your plan. Please upgrade to Premium.");
        }
        let item = body["vaultItemId"].as_u64().unwrap_or(0);
        if self.items.get(&item).map(|i| i.owner) != Some(user_id) {
            return fail(404, "Vault item not found");
        }
        let recipient = body["sharedWithUsernameOrEmail"].as_str().unwrap_or_default();
        let Some(to) = self.user_id_by_name(recipient) else {
            return fail(404, "User not found");
        };
        self.shares.push(Share {
            item,
            from: user_id,
            to,
            can_edit: body["canEdit"].as_bool().unwrap_or(false),
        });
        ok_empty()
    }

    fn received(&self, user_id: u64) -> RawResponse {
        let shared: Vec<Value> = self
            .shares
            .iter()
            .filter(|s| s.to == user_id)
            .map(|s| {
                json!({
                    "vaultItem": self.render(s.item, &self.items[&s.item]),
                    "sharedByUsername": self.user(s.from).username,
                    "canEdit": s.can_edit,
                    "sharedAt": TIMESTAMP,
                })
            })
            .collect();
        ok(Value::Array(shared))
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let response = self.handle(&request);

        if request.method == Method::GET && request.path == "/vault" {
            let racing_logout = self.lock().logout_during_list.take();
            if let Some(store) = racing_logout {
                store
                    .clear()
                    .await
                    .map_err(|e| TransportError::Other(e.to_string()))?;
            }
        }

        Ok(response)
    }
}

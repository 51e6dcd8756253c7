//! Vault data model shared by the session, API and sync crates.
//!
//! The secret of an item only ever exists inside a [`VaultDraft`]. A
//! [`VaultItem`] as returned by the server (and as cached locally) has no
//! secret field at all.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{ItemId, Secret};
use crate::{Error, Result};

const MAX_TITLE_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 255;
const MAX_URL_LEN: usize = 500;
const MAX_FOLDER_LEN: usize = 100;

/// Timestamps arrive either as RFC 3339 or as the server's zone-less
/// ISO-8601 local date-time. Both are kept as naive UTC.
mod lenient_datetime {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    pub fn parse(raw: &str) -> Result<NaiveDateTime, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.naive_utc());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.filter(|s| !s.is_empty())
            .map(|s| parse(&s).map_err(D::Error::custom))
            .transpose()
    }
}

/// Subscription limits and capabilities, as cached on the client.
///
/// Advisory only: the server enforces the same limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDescriptor {
    /// Plan name (e.g. "Free", "Premium").
    pub name: String,
    /// Maximum number of items in the vault.
    pub max_vault_items: u32,
    /// Maximum password length in characters.
    pub max_password_length: u32,
    pub can_export: bool,
    pub can_import: bool,
    pub can_share: bool,
}

impl PlanDescriptor {
    /// Build a descriptor from the server's limits object and plan name.
    ///
    /// Missing limits are read as zero and missing flags as false.
    pub fn from_limits(name: impl Into<String>, limits: &PlanLimits) -> Self {
        Self {
            name: name.into(),
            max_vault_items: limits.max_vault_items.unwrap_or(0),
            max_password_length: limits.max_password_length.unwrap_or(0),
            can_export: limits.can_export.unwrap_or(false),
            can_import: limits.can_import.unwrap_or(false),
            can_share: limits.can_share.unwrap_or(false),
        }
    }
}

/// Plan limits as sent by the server (`planLimits` on login, `limits` on
/// `/user/plan`). Every field is nullable on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    #[serde(default)]
    pub max_vault_items: Option<u32>,
    #[serde(default)]
    pub max_password_length: Option<u32>,
    #[serde(default)]
    pub can_export: Option<bool>,
    #[serde(default)]
    pub can_import: Option<bool>,
    #[serde(default)]
    pub can_share: Option<bool>,
}

/// One credential entry as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    /// Server-assigned id; absent until the server has acknowledged the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "lenient_datetime"
    )]
    pub created_at: Option<NaiveDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "lenient_datetime"
    )]
    pub updated_at: Option<NaiveDateTime>,
}

/// Whether a draft is about to be created or used to update an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Create,
    Update,
}

/// Create/update payload. The only type that carries an item secret.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Sent as `password`. Empty on update means "leave unchanged".
    #[serde(rename = "password")]
    pub secret: Secret,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl VaultDraft {
    /// Start a new draft with the given title and an empty secret.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Start an edit of `item`. The secret always starts empty.
    pub fn from_item(item: &VaultItem) -> Self {
        Self {
            title: item.title.clone(),
            username: item.username.clone(),
            secret: Secret::empty(),
            url: item.url.clone(),
            notes: item.notes.clone(),
            folder: item.folder.clone(),
            tags: item.tags.clone(),
            is_favorite: item.is_favorite,
        }
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the draft against the server's field constraints.
    ///
    /// # Errors
    /// - `InvalidInput` naming the first violated constraint
    pub fn validate(&self, kind: DraftKind) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Title is required".to_string()));
        }
        check_len("Title", Some(&self.title), MAX_TITLE_LEN)?;
        check_len("Username", self.username.as_deref(), MAX_USERNAME_LEN)?;
        check_len("URL", self.url.as_deref(), MAX_URL_LEN)?;
        check_len("Folder", self.folder.as_deref(), MAX_FOLDER_LEN)?;
        if kind == DraftKind::Create && self.secret.is_empty() {
            return Err(Error::InvalidInput("Password is required".to_string()));
        }
        Ok(())
    }
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(Error::InvalidInput(format!(
            "{} must not exceed {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// One rejected entry of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    /// Position of the entry in the submitted `items` array, when known.
    pub index: Option<usize>,
    pub reason: String,
}

/// Per-item tally of one import call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported_count: usize,
    pub error_count: usize,
    #[serde(default)]
    pub errors: Vec<ImportFailure>,
}

impl ImportResult {
    /// True when some entries were rejected.
    pub fn is_partial(&self) -> bool {
        self.error_count > 0
    }

    /// Human-readable summary, as shown after an import.
    pub fn summary(&self) -> String {
        if self.error_count > 0 {
            format!(
                "Import completed: {} items imported, {} errors",
                self.imported_count, self.error_count
            )
        } else {
            format!("Import completed: {} items imported", self.imported_count)
        }
    }
}

/// An item another user shared with the current user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedItem {
    pub vault_item: VaultItem,
    #[serde(default)]
    pub shared_by_username: String,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub shared_at: String,
}

//! Vault export and import.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use passvault_api::{ApiGateway, Method, RawResponse};
use passvault_common::{Error, ImportFailure, ImportResult, Operation, Result, UserId};

/// File name used when the server does not suggest one.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "vault-export.json";

const IMPORT_ERROR_PREFIX: &str = "Failed to import item: ";

/// A downloaded export, ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedVault {
    /// Suggested file name.
    pub file_name: String,
    /// Document bytes exactly as served. Contains plaintext secrets.
    pub content: Vec<u8>,
}

impl ExportedVault {
    /// Parse the payload.
    ///
    /// # Errors
    /// - `InvalidFormat` if it is not an export document
    pub fn document(&self) -> Result<ExportDocument> {
        serde_json::from_slice(&self.content)
            .map_err(|e| Error::InvalidFormat(format!("not an export document: {}", e)))
    }
}

/// Structure of an export (and import) document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    /// Items as exported, secrets included.
    pub items: Vec<Value>,
}

/// Per-item import errors arrive either as plain text or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireImportError {
    Detailed {
        #[serde(default)]
        index: Option<usize>,
        #[serde(alias = "message")]
        reason: String,
    },
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireImportResult {
    #[serde(default)]
    imported_count: usize,
    #[serde(default)]
    error_count: usize,
    #[serde(default)]
    errors: Option<Vec<WireImportError>>,
}

impl WireImportResult {
    /// Attach each error to the position of the item it names.
    fn into_result(self, submitted: &[Value]) -> ImportResult {
        let mut claimed = vec![false; submitted.len()];
        let errors = self
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| match e {
                WireImportError::Detailed { index, reason } => {
                    if let Some(slot) = index.and_then(|i| claimed.get_mut(i)) {
                        *slot = true;
                    }
                    ImportFailure { index, reason }
                }
                WireImportError::Text(reason) => ImportFailure {
                    index: attribute(&reason, submitted, &mut claimed),
                    reason,
                },
            })
            .collect();

        ImportResult {
            imported_count: self.imported_count,
            error_count: self.error_count,
            errors,
        }
    }
}

/// Find the first unclaimed item whose title the error message names.
fn attribute(reason: &str, submitted: &[Value], claimed: &mut [bool]) -> Option<usize> {
    let rest = reason.strip_prefix(IMPORT_ERROR_PREFIX)?;
    let index = submitted.iter().enumerate().position(|(i, item)| {
        !claimed[i]
            && item
                .get("title")
                .and_then(Value::as_str)
                .is_some_and(|title| {
                    rest == title || rest.starts_with(&format!("{} - ", title))
                })
    })?;
    claimed[index] = true;
    Some(index)
}

/// `filename` parameter of a `Content-Disposition` header, without any path.
fn file_name_from(disposition: &str) -> Option<String> {
    let value = disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    let name = value.rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// The export endpoint reports some failures as `{success: false}` with a
/// success status.
fn disguised_failure(response: &RawResponse) -> Option<Error> {
    let body = response.json_body()?;
    let object = body.as_object()?;
    if object.get("success") != Some(&Value::Bool(false)) {
        return None;
    }
    let message = object
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(Operation::Export.fallback_message());
    Some(Error::Api {
        status: response.status,
        message: Some(message.to_string()),
    })
}

/// Bulk export and import of the vault.
pub struct ImportExportEngine {
    gateway: Arc<ApiGateway>,
}

impl ImportExportEngine {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    /// Download the export document.
    ///
    /// # Errors
    /// - `PlanLimitExceeded` if the cached plan has no export
    /// - `Api` for failure statuses and for failures reported in the body
    pub async fn export(&self) -> Result<ExportedVault> {
        if let Some(plan) = self.gateway.session().cached_plan().await {
            passvault_policy::check_export(&plan)?;
        }

        let response = self
            .gateway
            .request_raw(Method::GET, "/vault/export/download", None)
            .await?;

        if let Some(err) = disguised_failure(&response) {
            warn!(
                "Export endpoint returned a failure payload with status {}",
                response.status
            );
            return Err(err);
        }

        let file_name = response
            .content_disposition
            .as_deref()
            .and_then(file_name_from)
            .unwrap_or_else(|| DEFAULT_EXPORT_FILE_NAME.to_string());
        info!("Exported vault ({} bytes)", response.body.len());

        Ok(ExportedVault {
            file_name,
            content: response.body,
        })
    }

    /// Upload the items of an export document.
    ///
    /// Rejected entries are reported in the result, not as an error.
    ///
    /// # Errors
    /// - `InvalidFormat` unless `document` is an object with an `items` array
    /// - `PlanLimitExceeded` if the cached plan has no import
    /// - Gateway errors
    pub async fn import(&self, document: &Value) -> Result<ImportResult> {
        let items = document
            .as_object()
            .and_then(|o| o.get("items"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::InvalidFormat("expected a JSON object with an \"items\" array".to_string())
            })?;

        if let Some(plan) = self.gateway.session().cached_plan().await {
            passvault_policy::check_import(&plan)?;
        }

        let wire: WireImportResult = self
            .gateway
            .data(Method::POST, "/vault/import", Some(json!({ "items": items })))
            .await?;
        let result = wire.into_result(items);

        info!(
            "Import finished: {} imported, {} failed",
            result.imported_count, result.error_count
        );
        Ok(result)
    }

    /// Parse `text` as JSON and import it.
    ///
    /// # Errors
    /// - `InvalidFormat` if `text` is not JSON
    /// - As [`Self::import`]
    pub async fn import_str(&self, text: &str) -> Result<ImportResult> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidFormat(e.to_string()))?;
        self.import(&document).await
    }
}

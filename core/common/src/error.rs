//! Common error types for the PassVault client.

use thiserror::Error;

/// Top-level error type for PassVault client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No response reached the client.
    #[error("Network error: {0}")]
    Network(String),

    /// The server responded with a failure.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        /// HTTP status of the response.
        status: u16,
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// The server rejected the session token; the local session was cleared.
    #[error("Session expired")]
    SessionExpired,

    /// A local plan check refused the operation before any network call.
    #[error("Plan limit exceeded: {0}")]
    PlanLimitExceeded(String),

    /// A document or response did not have the expected shape.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation needs a session and none exists.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session changed while a request was in flight; its result was dropped.
    #[error("Session changed while the request was in flight")]
    SessionChanged,

    /// Session persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Human-readable message for `op`, falling back to the operation's
    /// generic text when the server gave nothing usable.
    pub fn user_message(&self, op: Operation) -> String {
        match self {
            Error::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Error::Api { .. } | Error::Network(_) | Error::SessionChanged => {
                op.fallback_message().to_string()
            }
            Error::SessionExpired => {
                "Your session has expired. Please log in again.".to_string()
            }
            Error::NotAuthenticated => "You are not logged in.".to_string(),
            Error::PlanLimitExceeded(message) | Error::InvalidInput(message) => message.clone(),
            Error::InvalidFormat(detail) if op == Operation::Import => {
                format!("Invalid import file format: {}", detail)
            }
            Error::InvalidFormat(_) => op.fallback_message().to_string(),
            Error::Storage(_) | Error::Serialization(_) => {
                format!("{}: {}", op.fallback_message(), self)
            }
        }
    }

    /// Whether the caller should send the user back to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::SessionExpired | Error::NotAuthenticated)
    }
}

/// User-facing operations, used to pick a fallback error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    LoadPlan,
    LoadItems,
    LoadItem,
    CreateItem,
    UpdateItem,
    DeleteItem,
    Export,
    Import,
    Share,
    LoadShared,
}

impl Operation {
    /// Generic message shown when the server provides none.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::Login => "Login failed. Please try again.",
            Operation::LoadPlan => "Failed to load plan information",
            Operation::LoadItems => "Failed to load vault items",
            Operation::LoadItem => "Failed to load vault item",
            Operation::CreateItem => "Failed to create vault item",
            Operation::UpdateItem => "Failed to update vault item",
            Operation::DeleteItem => "Failed to delete vault item",
            Operation::Export => "Failed to export vault",
            Operation::Import => "Failed to import vault",
            Operation::Share => "Failed to share vault item",
            Operation::LoadShared => "Failed to load shared items",
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

//! Vault synchronization for the PassVault client.
//!
//! This crate provides:
//! - `VaultSync`: the local item cache and CRUD with whole-cache reconciliation
//! - `ImportExportEngine`: bulk export download and import upload
//! - `ShareCoordinator`: sharing items and listing items shared with the user
//! - `AuthService`: login, logout and plan refresh
//! - `VaultClient`: wires the above to one session store and transport

pub mod auth;
pub mod client;
pub mod share;
pub mod transfer;
pub mod vault;

pub use auth::AuthService;
pub use client::VaultClient;
pub use share::ShareCoordinator;
pub use transfer::{ExportDocument, ExportedVault, ImportExportEngine};
pub use vault::VaultSync;

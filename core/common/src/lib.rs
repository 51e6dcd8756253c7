//! Common types shared across the PassVault client crates.
//!
//! This crate holds the error taxonomy, identifiers, the secret wrapper and
//! the vault data model, so every other crate agrees on one wire shape.

pub mod error;
pub mod model;
pub mod types;

pub use error::{Error, Operation, Result};
pub use model::{
    DraftKind, ImportFailure, ImportResult, PlanDescriptor, PlanLimits, SharedItem, VaultDraft,
    VaultItem,
};
pub use types::{ItemId, Secret, UserId};

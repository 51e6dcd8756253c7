//! Session persistence for the PassVault client.
//!
//! This module provides:
//! - The [`SessionStore`], the single owner of the authenticated session and
//!   the cached plan descriptor
//! - A [`KeyValueStore`] abstraction for durable storage, with a SQLite
//!   backend for real use and an in-memory backend for tests
//!
//! A session is either fully present or fully absent. Nothing in this crate
//! touches the network.

pub mod kv;
pub mod sqlite;
pub mod store;

pub use kv::{KeyValueStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use store::{Session, SessionHandle, SessionStore};

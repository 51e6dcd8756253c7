//! SQLite-backed key-value store for session persistence.
//!
//! Keeps session state across process restarts in a single-table database.

use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

use passvault_common::{Error, Result};

use crate::kv::KeyValueStore;

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

/// Session key-value store using SQLite.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open a session database.
    ///
    /// # Errors
    /// - Database creation or schema setup failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let store = Self::from_connection(Connection::open(db_path).map_err(storage_err)?)?;
        restrict_permissions(db_path);

        info!("Session store opened at {}", db_path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(storage_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(storage_err)?;
        Ok(Self { conn })
    }
}

/// The database holds a bearer token; keep it private to the user.
#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        debug!("Could not restrict session store permissions: {}", e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM session_kv WHERE key = ?1")
            .map_err(storage_err)?;

        match stmt.query_row([key], |row| row.get(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn write(&mut self, puts: &[(&str, String)], removals: &[&str]) -> Result<()> {
        let tx = self.conn.transaction().map_err(storage_err)?;
        for (key, value) in puts {
            tx.execute(
                "INSERT OR REPLACE INTO session_kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(storage_err)?;
        }
        for key in removals {
            tx.execute("DELETE FROM session_kv WHERE key = ?1", params![key])
                .map_err(storage_err)?;
        }
        tx.commit().map_err(storage_err)?;
        debug!(
            "Session store write: {} puts, {} removals",
            puts.len(),
            removals.len()
        );
        Ok(())
    }
}

// ⚙️ Store configuration
//
// Where the database lives and how the connection is prepared before the
// engine touches it.

use crate::db::{ensure_admin, setup_database};
use crate::error::Result;
use crate::registry::Registry;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Path that opens a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file, or `:memory:`
    pub database_path: PathBuf,

    /// Use write-ahead logging (ignored for in-memory stores)
    pub journal_wal: bool,

    /// Enforce foreign keys; project/delivery-date cascades depend on it
    pub foreign_keys: bool,

    /// Create the default admin user when the user table is empty
    pub seed_admin: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("courses.db"),
            journal_wal: true,
            foreign_keys: true,
            seed_admin: true,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// In-memory store with defaults otherwise, for tests and dry runs
    pub fn in_memory() -> Self {
        Self::builder().database_path(IN_MEMORY).build()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    /// Open the connection, apply pragmas, create the schema and seed the admin.
    pub fn open(&self) -> Result<Connection> {
        let conn = if self.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&self.database_path)?
        };

        conn.pragma_update(None, "foreign_keys", self.foreign_keys)?;
        if self.journal_wal && !self.is_in_memory() {
            // journal_mode returns the resulting mode as a row
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            info!("Journal mode: {}", mode);
        }

        setup_database(&conn)?;
        if self.seed_admin {
            ensure_admin(&conn, Registry::global())?;
        }

        info!("Opened store at {}", self.database_path.display());
        Ok(conn)
    }
}

#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    database_path: Option<PathBuf>,
    journal_wal: Option<bool>,
    foreign_keys: Option<bool>,
    seed_admin: Option<bool>,
}

impl StoreConfigBuilder {
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn journal_wal(mut self, enabled: bool) -> Self {
        self.journal_wal = Some(enabled);
        self
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = Some(enabled);
        self
    }

    pub fn seed_admin(mut self, enabled: bool) -> Self {
        self.seed_admin = Some(enabled);
        self
    }

    pub fn build(self) -> StoreConfig {
        let defaults = StoreConfig::default();

        StoreConfig {
            database_path: self.database_path.unwrap_or(defaults.database_path),
            journal_wal: self.journal_wal.unwrap_or(defaults.journal_wal),
            foreign_keys: self.foreign_keys.unwrap_or(defaults.foreign_keys),
            seed_admin: self.seed_admin.unwrap_or(defaults.seed_admin),
        }
    }
}

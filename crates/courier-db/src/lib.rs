pub mod migrations;
pub mod models;

mod conversations;
mod messages;
mod uploads;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Validation(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl StoreError {
    /// Stable machine-readable code surfaced over HTTP and gateway error
    /// events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Corrupt(_) | Self::LockPoisoned | Self::Db(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database, used by tests and dev tooling.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}

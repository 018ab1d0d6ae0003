//! Local SQLite store for the rollcall assistant.
//!
//! Owns the relational schema and every mutation path: user and subject
//! records, timetable slots, the attendance ledger (logs + running stats)
//! and the pending-action state machine. Handlers share one connection
//! behind a mutex; multi-step mutations run as single transactions.

pub mod attendance;
mod error;
pub mod pending;
pub mod subjects;
pub mod timetable;
pub mod users;

pub use error::StoreError;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub type Result<T> = std::result::Result<T, StoreError>;

/// A named migration: `(name, sql)`.
type Migration = (&'static str, &'static str);

const MIGRATIONS: &[Migration] = &[(
    "0001_schema",
    include_str!("../migrations/0001_schema.sql"),
)];

/// Shared database handle.
/// Thread-safe: wraps the connection in a Mutex so it can be cloned across
/// handlers.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (or create) the database at `path`, applying any pending
    /// migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        init(Connection::open(path)?)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        init(Connection::open_in_memory()?)
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

fn init(conn: Connection) -> Result<Db> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    run_migrations(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        if !already_applied {
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("applied migration {name}");
        }
    }
    Ok(())
}

/// Wrap a decode failure from a TEXT column into a rusqlite error so row
/// mappers can propagate it.
pub(crate) fn conv_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

use crate::error::{RecallError, Result};

/// Open (or create) the index database at the given path, with pragmas set
/// and schema initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;

    // WAL mode: concurrent readers with a single writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Cascade deletes depend on this
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Wait up to 5 seconds for locks instead of failing immediately
    conn.pragma_update(None, "busy_timeout", "5000")?;

    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;

    // Quick integrity check after schema init
    let integrity: String = conn.pragma_query_value(None, "quick_check", |row| row.get(0))?;
    if integrity != "ok" {
        return Err(RecallError::Internal(format!(
            "database integrity check failed: {integrity}. \
             Delete {} and re-index to start fresh.",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with the full schema. Used by tests and by
/// hosts that want a throwaway index.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

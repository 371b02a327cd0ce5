//! Open the catalog and check it carries the validation tables.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::utils::config::StoreConsts;

use super::VALIDATION_TABLES_SQL;

/// Open an existing catalog read-write. Never creates a file.
/// Sets a short busy timeout so a catalog held open by another application fails fast.
pub fn open_catalog(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        anyhow::bail!("catalog not found: {}", path.display());
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .with_context(|| format!("open catalog {}", path.display()))?;
    conn.busy_timeout(StoreConsts::BUSY_TIMEOUT)
        .context("set busy timeout")?;
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |_| Ok(()))
        .with_context(|| {
            format!(
                "catalog {} could not be read; is it open in another application?",
                path.display()
            )
        })?;
    Ok(conn)
}

/// Empty in-memory database (tests and tooling that build their own catalog).
pub fn open_catalog_in_memory() -> Result<Connection> {
    Connection::open_in_memory().context("open in-memory database")
}

/// True when both side tables exist.
pub fn validation_tables_present(conn: &Connection) -> Result<bool> {
    let n: i64 = conn
        .query_row(VALIDATION_TABLES_SQL, [], |row| row.get(0))
        .context("look up validation tables")?;
    Ok(n == 2)
}

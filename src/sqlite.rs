//! SQLite-backed usage and entitlement storage.
//!
//! Survives restarts and can be shared by several server processes on one
//! host. Calls are one or two short statements, so they run inline on the async
//! worker rather than on the blocking pool.

use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::entitlement::EntitlementStore;
use crate::error::Result;
use crate::usage::UsageStore;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS usage (
        identity TEXT NOT NULL,
        day TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (identity, day)
    );
    CREATE TABLE IF NOT EXISTS entitlements (
        identity TEXT PRIMARY KEY,
        updated_at TEXT NOT NULL
    );
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        info!("usage database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl UsageStore for SqliteStore {
    fn count(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        let count = self
            .conn
            .lock()
            .query_row(
                "SELECT count FROM usage WHERE identity = ?1 AND day = ?2",
                params![identity, day.to_string()],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    fn increment(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        let conn = self.conn.lock();
        prune_before(&conn, day)?;
        let count = conn.query_row(
            "INSERT INTO usage (identity, day, count) VALUES (?1, ?2, 1)
             ON CONFLICT (identity, day) DO UPDATE SET count = count + 1
             RETURNING count",
            params![identity, day.to_string()],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn try_increment(&self, identity: &str, day: NaiveDate, limit: u32) -> Result<Option<u32>> {
        let conn = self.conn.lock();
        prune_before(&conn, day)?;
        // Neither branch writes a row once the limit is reached, so RETURNING is empty.
        let count = conn
            .query_row(
                "INSERT INTO usage (identity, day, count) SELECT ?1, ?2, 1 WHERE ?3 > 0
                 ON CONFLICT (identity, day) DO UPDATE SET count = count + 1 WHERE count < ?3
                 RETURNING count",
                params![identity, day.to_string(), limit],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(count)
    }

    fn release(&self, identity: &str, day: NaiveDate) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE usage SET count = count - 1 WHERE identity = ?1 AND day = ?2 AND count > 0",
            params![identity, day.to_string()],
        )?;
        Ok(())
    }
}

/// Days are stored as `YYYY-MM-DD`, so text order is date order.
fn prune_before(conn: &Connection, day: NaiveDate) -> Result<()> {
    let removed = conn.execute("DELETE FROM usage WHERE day < ?1", params![day.to_string()])?;
    if removed > 0 {
        debug!(removed, "Pruned usage rows from earlier days");
    }
    Ok(())
}

impl EntitlementStore for SqliteStore {
    fn is_entitled(&self, identity: &str) -> Result<bool> {
        let found = self
            .conn
            .lock()
            .query_row(
                "SELECT 1 FROM entitlements WHERE identity = ?1",
                params![identity],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn set_entitled(&self, identity: &str, entitled: bool) -> Result<()> {
        let conn = self.conn.lock();
        if entitled {
            conn.execute(
                "INSERT INTO entitlements (identity, updated_at) VALUES (?1, ?2)
                 ON CONFLICT (identity) DO UPDATE SET updated_at = excluded.updated_at",
                params![identity, chrono::Utc::now().to_rfc3339()],
            )?;
        } else {
            conn.execute(
                "DELETE FROM entitlements WHERE identity = ?1",
                params![identity],
            )?;
        }
        Ok(())
    }
}

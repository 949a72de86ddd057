//! Ordered schema steps for the site store.
//!
//! Each step is `(version, sql)`; the applied version lives in
//! `PRAGMA user_version`. Append new steps, never edit shipped ones.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

const STEPS: &[(u32, &str)] = &[
    (1, include_str!("0001_sites_items.sql")),
    (2, include_str!("0002_item_key_index.sql")),
];

/// Highest schema version this build can produce.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Reads the schema version recorded in the database file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings `conn` up to [`latest_version`] inside a single transaction.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending: Vec<_> = STEPS.iter().filter(|(version, _)| *version > found).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={supported}");
    Ok(())
}

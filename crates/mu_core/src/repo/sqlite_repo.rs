//! SQLite site repository.
//!
//! # Responsibility
//! - Persist sites and items in the `sites`/`items` tables.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - The connection guard is held only for the duration of one call.
//! - Item order is the autoincrement `id` order (insertion order).
//! - Single-item writes target the lowest matching `id` only.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::{open_db, open_db_in_memory};
use crate::model::item::{Item, ItemKey};
use crate::model::site::Site;
use crate::repo::{RepoError, RepoResult, SiteRepository};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SITE_SELECT_SQL: &str = "SELECT
    reference,
    url,
    title,
    admin,
    created_at,
    updated_at,
    visited_at,
    security
FROM sites";

const ITEM_SELECT_SQL: &str = "SELECT
    reference,
    type,
    title,
    content,
    created_at,
    updated_at
FROM items";

const FIRST_MATCH_SQL: &str = "SELECT id FROM items
    WHERE reference = ?1 AND type = ?2 AND title = ?3
    ORDER BY id ASC
    LIMIT 1";

/// SQLite-backed site repository.
pub struct SqliteSiteRepository {
    conn: Mutex<Connection>,
}

impl SqliteSiteRepository {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (or creates) a database file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RepoError::Poisoned("sqlite connection"))
    }
}

impl SiteRepository for SqliteSiteRepository {
    fn list_sites(&self) -> RepoResult<Vec<Site>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SITE_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut sites = Vec::new();

        while let Some(row) = rows.next()? {
            sites.push(parse_site_row(row)?);
        }

        Ok(sites)
    }

    fn get_site(&self, reference: &str) -> RepoResult<Option<Site>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SITE_SELECT_SQL} WHERE reference = ?1;"))?;
        let mut rows = stmt.query([reference])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_site_row(row)?));
        }

        Ok(None)
    }

    fn insert_site(&self, site: &Site) -> RepoResult<()> {
        let conn = self.conn()?;
        if site_exists(&conn, &site.reference)? {
            return Err(RepoError::DuplicateSite(site.reference.clone()));
        }

        conn.execute(
            "INSERT INTO sites (
                reference,
                url,
                title,
                admin,
                created_at,
                updated_at,
                visited_at,
                security
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                site.reference.as_str(),
                site.url.as_str(),
                site.title.as_str(),
                site.admin.as_str(),
                site.created_at,
                site.updated_at,
                site.visited_at,
                bool_to_int(site.security),
            ],
        )?;

        Ok(())
    }

    fn save_site(&self, site: &Site) -> RepoResult<bool> {
        let changed = self.conn()?.execute(
            "UPDATE sites
             SET
                url = ?1,
                title = ?2,
                admin = ?3,
                updated_at = ?4,
                visited_at = ?5,
                security = ?6
             WHERE reference = ?7;",
            params![
                site.url.as_str(),
                site.title.as_str(),
                site.admin.as_str(),
                site.updated_at,
                site.visited_at,
                bool_to_int(site.security),
                site.reference.as_str(),
            ],
        )?;

        Ok(changed > 0)
    }

    fn list_items(&self, reference: &str) -> RepoResult<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT_SQL} WHERE reference = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([reference])?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        Ok(items)
    }

    fn insert_item(&self, item: &Item) -> RepoResult<()> {
        let conn = self.conn()?;
        if !site_exists(&conn, &item.reference)? {
            return Err(RepoError::SiteMissing(item.reference.clone()));
        }

        conn.execute(
            "INSERT INTO items (
                reference,
                type,
                title,
                content,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                item.reference.as_str(),
                item.kind.as_str(),
                item.title.as_str(),
                item.content.as_str(),
                item.created_at,
                item.updated_at,
            ],
        )?;

        Ok(())
    }

    fn replace_item(&self, reference: &str, key: &ItemKey, item: &Item) -> RepoResult<bool> {
        let changed = self.conn()?.execute(
            &format!(
                "UPDATE items
                 SET
                    type = ?4,
                    title = ?5,
                    content = ?6,
                    created_at = ?7,
                    updated_at = ?8
                 WHERE id = ({FIRST_MATCH_SQL});"
            ),
            params![
                reference,
                key.kind.as_str(),
                key.title.as_str(),
                item.kind.as_str(),
                item.title.as_str(),
                item.content.as_str(),
                item.created_at,
                item.updated_at,
            ],
        )?;

        Ok(changed > 0)
    }

    fn remove_item(&self, reference: &str, key: &ItemKey) -> RepoResult<bool> {
        let changed = self.conn()?.execute(
            &format!("DELETE FROM items WHERE id = ({FIRST_MATCH_SQL});"),
            params![reference, key.kind.as_str(), key.title.as_str()],
        )?;

        Ok(changed > 0)
    }
}

fn site_exists(conn: &Connection, reference: &str) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sites WHERE reference = ?1;",
            [reference],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn parse_site_row(row: &Row<'_>) -> RepoResult<Site> {
    let security = match row.get::<_, i64>("security")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid security value `{other}` in sites.security"
            )));
        }
    };

    Ok(Site {
        reference: row.get("reference")?,
        url: row.get("url")?,
        title: row.get("title")?,
        admin: row.get("admin")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        visited_at: row.get("visited_at")?,
        security,
    })
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    Ok(Item {
        reference: row.get("reference")?,
        kind: row.get("type")?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

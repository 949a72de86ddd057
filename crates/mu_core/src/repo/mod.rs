//! Site/item repository contract and persistence implementations.
//!
//! # Responsibility
//! - Define one-shot record operations over the `sites` and `items` sets.
//! - Isolate storage details (in-memory map, SQLite) from the directory.
//!
//! # Invariants
//! - Every call is atomic on its own: it either applies fully or leaves
//!   stored state unchanged.
//! - Repositories do not enforce item key uniqueness; the directory does.
//! - Item order within a site is insertion order.

use crate::db::DbError;
use crate::model::item::{Item, ItemKey};
use crate::model::site::Site;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for site/item persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Insert of a site whose reference already exists.
    DuplicateSite(String),
    /// Item write targeting a site that does not exist.
    SiteMissing(String),
    /// A guard around shared storage was poisoned by a panicking writer.
    Poisoned(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateSite(reference) => write!(f, "site already exists: {reference}"),
            Self::SiteMissing(reference) => write!(f, "site not found: {reference}"),
            Self::Poisoned(what) => write!(f, "{what} lock poisoned"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consumed by `ItemDirectory`.
pub trait SiteRepository: Send + Sync {
    /// All sites in the store's natural order.
    fn list_sites(&self) -> RepoResult<Vec<Site>>;
    fn get_site(&self, reference: &str) -> RepoResult<Option<Site>>;
    /// Fails with `DuplicateSite` when `site.reference` is taken.
    fn insert_site(&self, site: &Site) -> RepoResult<()>;
    /// Overwrites the stored site. Returns `false` when it does not exist.
    fn save_site(&self, site: &Site) -> RepoResult<bool>;
    /// Items of `reference` in insertion order (empty for unknown sites).
    fn list_items(&self, reference: &str) -> RepoResult<Vec<Item>>;
    /// Appends `item` under `item.reference`. Fails with `SiteMissing`.
    fn insert_item(&self, item: &Item) -> RepoResult<()>;
    /// Replaces the first item matching `key`, keeping its position.
    /// Returns `false` when nothing matched.
    fn replace_item(&self, reference: &str, key: &ItemKey, item: &Item) -> RepoResult<bool>;
    /// Removes the first item matching `key`. Returns `false` when nothing matched.
    fn remove_item(&self, reference: &str, key: &ItemKey) -> RepoResult<bool>;
}

impl<R: SiteRepository + ?Sized> SiteRepository for Box<R> {
    fn list_sites(&self) -> RepoResult<Vec<Site>> {
        (**self).list_sites()
    }

    fn get_site(&self, reference: &str) -> RepoResult<Option<Site>> {
        (**self).get_site(reference)
    }

    fn insert_site(&self, site: &Site) -> RepoResult<()> {
        (**self).insert_site(site)
    }

    fn save_site(&self, site: &Site) -> RepoResult<bool> {
        (**self).save_site(site)
    }

    fn list_items(&self, reference: &str) -> RepoResult<Vec<Item>> {
        (**self).list_items(reference)
    }

    fn insert_item(&self, item: &Item) -> RepoResult<()> {
        (**self).insert_item(item)
    }

    fn replace_item(&self, reference: &str, key: &ItemKey, item: &Item) -> RepoResult<bool> {
        (**self).replace_item(reference, key, item)
    }

    fn remove_item(&self, reference: &str, key: &ItemKey) -> RepoResult<bool> {
        (**self).remove_item(reference, key)
    }
}

//! Item directory use-case service.
//!
//! # Responsibility
//! - Provide identity-keyed CRUD over each site's item collection.
//! - Apply patches under the configured `MergePolicy` and stamp timestamps.
//! - Serialize mutations per site while letting different sites proceed
//!   in parallel.
//!
//! # Invariants
//! - Within one site, `(type, title)` identifies at most one item; both
//!   `add_item` and key-changing `update_item` reject collisions.
//! - `created_at` is stamped once; `updated_at` is refreshed on every
//!   successful update.
//! - A failed operation leaves stored state unchanged.
//! - Only existing sites own an entry in the lock registry; requests for
//!   unknown references are rejected before one is created.
//! - Every repository call is one-shot; retries belong to the caller.

use crate::model::item::{Item, ItemKey, NewItem};
use crate::model::patch::{apply_item_patch, apply_site_patch, ItemPatch, MergePolicy, SitePatch};
use crate::model::site::{NewSite, Site, SiteIndex};
use crate::repo::{RepoError, SiteRepository};
use log::{debug, error, info};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const INDEX_MESSAGE: &str = "This is Mu's api, you better know what you are doing.";

/// Source of "now" in Unix epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Coarse error category used by adapters to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    StoreUnavailable,
}

/// Errors from item directory operations.
#[derive(Debug)]
pub enum DirectoryError {
    /// The payload cannot be stored, e.g. a blank key field.
    InvalidInput(String),
    /// No site has this reference.
    SiteNotFound(String),
    /// The site exists but no item matches the key.
    ItemNotFound { reference: String, key: ItemKey },
    /// A site with this reference already exists.
    SiteConflict(String),
    /// Another item under the site already uses this key.
    ItemConflict { reference: String, key: ItemKey },
    /// The backing store failed or is unreachable.
    StoreUnavailable(RepoError),
}

impl DirectoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::SiteNotFound(_) | Self::ItemNotFound { .. } => ErrorKind::NotFound,
            Self::SiteConflict(_) | Self::ItemConflict { .. } => ErrorKind::Conflict,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::SiteNotFound(_) => "site_not_found",
            Self::ItemNotFound { .. } => "item_not_found",
            Self::SiteConflict(_) => "site_conflict",
            Self::ItemConflict { .. } => "item_conflict",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
            Self::SiteNotFound(reference) => write!(f, "site not found: {reference}"),
            Self::ItemNotFound { reference, key } => {
                write!(f, "item not found: {reference}/{key}")
            }
            Self::SiteConflict(reference) => write!(f, "site already exists: {reference}"),
            Self::ItemConflict { reference, key } => {
                write!(f, "item already exists: {reference}/{key}")
            }
            Self::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DirectoryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::SiteMissing(reference) => Self::SiteNotFound(reference),
            RepoError::DuplicateSite(reference) => Self::SiteConflict(reference),
            other => Self::StoreUnavailable(other),
        }
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// One reader/writer lock per known site reference.
///
/// Sites are never removed, so an entry stays valid for the process lifetime.
#[derive(Default)]
struct SiteLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl SiteLocks {
    // Guarded data is `()`, so a poisoned guard carries no broken state.
    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<RwLock<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, reference: &str) -> Option<Arc<RwLock<()>>> {
        self.registry().get(reference).map(Arc::clone)
    }

    fn register(&self, reference: &str) -> Arc<RwLock<()>> {
        Arc::clone(self.registry().entry(reference.to_string()).or_default())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.registry().len()
    }
}

fn read_site(lock: &RwLock<()>) -> RwLockReadGuard<'_, ()> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_site(lock: &RwLock<()>) -> RwLockWriteGuard<'_, ()> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Site/item directory over a repository implementation.
pub struct ItemDirectory<R: SiteRepository> {
    repo: R,
    policy: MergePolicy,
    clock: Clock,
    locks: SiteLocks,
}

impl<R: SiteRepository> ItemDirectory<R> {
    /// Creates a directory using the wall clock.
    pub fn new(repo: R, policy: MergePolicy) -> Self {
        Self {
            repo,
            policy,
            clock: Arc::new(now_epoch_ms),
            locks: SiteLocks::default(),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Lists every site in the store's natural order.
    pub fn list_sites(&self) -> DirectoryResult<Vec<Site>> {
        let started_at = Instant::now();
        let result = self.repo.list_sites().map_err(DirectoryError::from);
        log_outcome("site_list", "*", started_at, &result);
        result
    }

    /// Builds the root listing: a greeting plus every site's url and reference.
    pub fn site_index(&self) -> DirectoryResult<SiteIndex> {
        let sites = self.list_sites()?;
        let (urls, refs): (Vec<String>, Vec<String>) = sites
            .into_iter()
            .map(|site| (site.url, site.reference))
            .unzip();
        Ok(SiteIndex {
            message: INDEX_MESSAGE.to_string(),
            urls,
            refs,
        })
    }

    pub fn get_site(&self, reference: &str) -> DirectoryResult<Site> {
        let started_at = Instant::now();
        let result = self.site_lock(reference).and_then(|lock| {
            let _guard = read_site(&lock);
            self.require_site(reference)
        });
        log_outcome("site_get", reference, started_at, &result);
        result
    }

    /// Seeds a new site, stamping `created_at`.
    ///
    /// Fails with `SiteConflict` when the reference is taken.
    pub fn create_site(&self, new_site: NewSite) -> DirectoryResult<Site> {
        let started_at = Instant::now();
        let reference = new_site.reference.clone();
        let result = if reference.trim().is_empty() {
            Err(DirectoryError::InvalidInput(
                "site reference must not be blank".to_string(),
            ))
        } else {
            let lock = self.locks.register(&reference);
            let _guard = write_site(&lock);
            let site = new_site.into_site(self.now());
            self.repo
                .insert_site(&site)
                .map(|()| site)
                .map_err(DirectoryError::from)
        };
        log_outcome("site_create", &reference, started_at, &result);
        result
    }

    /// Creates every site in `seeds` whose reference is not stored yet.
    ///
    /// Returns the number of sites created. Existing references are skipped
    /// so the same seed list can be applied on every startup.
    pub fn seed_sites(&self, seeds: Vec<NewSite>) -> DirectoryResult<usize> {
        let mut created = 0;
        for seed in seeds {
            match self.create_site(seed) {
                Ok(_) => created += 1,
                Err(DirectoryError::SiteConflict(_)) => {}
                Err(err) => return Err(err),
            }
        }
        info!("event=site_seed module=directory status=ok created={created}");
        Ok(created)
    }

    /// Merges `patch` into the stored site and refreshes `updated_at`.
    ///
    /// The reference itself can never change through a patch.
    pub fn update_site(&self, reference: &str, patch: &SitePatch) -> DirectoryResult<Site> {
        let started_at = Instant::now();
        let result = self.site_lock(reference).and_then(|lock| {
            let _guard = write_site(&lock);
            let mut site = self.require_site(reference)?;
            apply_site_patch(&mut site, patch, self.policy);
            site.updated_at = Some(self.now());
            if self.repo.save_site(&site)? {
                Ok(site)
            } else {
                Err(DirectoryError::SiteNotFound(reference.to_string()))
            }
        });
        log_outcome("site_update", reference, started_at, &result);
        result
    }

    /// Lists a site's items in stored order.
    pub fn list_items(&self, reference: &str) -> DirectoryResult<Vec<Item>> {
        let started_at = Instant::now();
        let result = self.site_lock(reference).and_then(|lock| {
            let _guard = read_site(&lock);
            self.require_site(reference)?;
            self.repo.list_items(reference).map_err(DirectoryError::from)
        });
        log_outcome("item_list", reference, started_at, &result);
        result
    }

    /// Finds the item matching `key` exactly.
    pub fn find_item(&self, reference: &str, key: &ItemKey) -> DirectoryResult<Item> {
        let started_at = Instant::now();
        let result = self.site_lock(reference).and_then(|lock| {
            let _guard = read_site(&lock);
            self.require_site(reference)?;
            self.repo
                .list_items(reference)?
                .into_iter()
                .find(|item| key.matches(item))
                .ok_or_else(|| item_not_found(reference, key))
        });
        log_outcome("item_get", reference, started_at, &result);
        result
    }

    /// Appends a new item to the site.
    ///
    /// Fails with `ItemConflict` and writes nothing when the key is taken.
    pub fn add_item(&self, reference: &str, new_item: NewItem) -> DirectoryResult<Item> {
        let started_at = Instant::now();
        let key = new_item.key();
        let result = match key.blank_field() {
            Some(field) => Err(DirectoryError::InvalidInput(format!(
                "item {field} must not be blank"
            ))),
            None => self.site_lock(reference),
        }
        .and_then(|lock| {
            let _guard = write_site(&lock);
            self.require_site(reference)?;
            if self
                .repo
                .list_items(reference)?
                .iter()
                .any(|item| key.matches(item))
            {
                return Err(DirectoryError::ItemConflict {
                    reference: reference.to_string(),
                    key,
                });
            }

            let item = new_item.into_item(reference, self.now());
            self.repo.insert_item(&item)?;
            Ok(item)
        });
        log_outcome("item_add", reference, started_at, &result);
        result
    }

    /// Merges `patch` into the item matching `key` and refreshes `updated_at`.
    ///
    /// A patch that renames the item onto another existing item's key is
    /// rejected with `ItemConflict`.
    pub fn update_item(
        &self,
        reference: &str,
        key: &ItemKey,
        patch: &ItemPatch,
    ) -> DirectoryResult<Item> {
        let started_at = Instant::now();
        let result = self.site_lock(reference).and_then(|lock| {
            let _guard = write_site(&lock);
            self.require_site(reference)?;
            let items = self.repo.list_items(reference)?;
            let position = items
                .iter()
                .position(|item| key.matches(item))
                .ok_or_else(|| item_not_found(reference, key))?;

            let mut updated = items[position].clone();
            apply_item_patch(&mut updated, patch, self.policy);
            let new_key = updated.key();
            if new_key != *key
                && items
                    .iter()
                    .enumerate()
                    .any(|(index, other)| index != position && new_key.matches(other))
            {
                return Err(DirectoryError::ItemConflict {
                    reference: reference.to_string(),
                    key: new_key,
                });
            }

            updated.updated_at = Some(self.now());
            if self.repo.replace_item(reference, key, &updated)? {
                Ok(updated)
            } else {
                Err(item_not_found(reference, key))
            }
        });
        log_outcome("item_update", reference, started_at, &result);
        result
    }

    /// Removes exactly one item matching `key`.
    pub fn delete_item(&self, reference: &str, key: &ItemKey) -> DirectoryResult<()> {
        let started_at = Instant::now();
        let result = self.site_lock(reference).and_then(|lock| {
            let _guard = write_site(&lock);
            self.require_site(reference)?;
            if self.repo.remove_item(reference, key)? {
                Ok(())
            } else {
                Err(item_not_found(reference, key))
            }
        });
        log_outcome("item_delete", reference, started_at, &result);
        result
    }

    /// Returns the site's lock, registering it only once the site is known
    /// to exist.
    fn site_lock(&self, reference: &str) -> DirectoryResult<Arc<RwLock<()>>> {
        if let Some(lock) = self.locks.get(reference) {
            return Ok(lock);
        }
        self.require_site(reference)?;
        Ok(self.locks.register(reference))
    }

    fn require_site(&self, reference: &str) -> DirectoryResult<Site> {
        self.repo
            .get_site(reference)?
            .ok_or_else(|| DirectoryError::SiteNotFound(reference.to_string()))
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }
}

fn item_not_found(reference: &str, key: &ItemKey) -> DirectoryError {
    DirectoryError::ItemNotFound {
        reference: reference.to_string(),
        key: key.clone(),
    }
}

fn log_outcome<T>(
    event: &str,
    reference: &str,
    started_at: Instant,
    result: &DirectoryResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => debug!(
            "event={event} module=directory status=ok site={reference} duration_ms={duration_ms}"
        ),
        Err(err) if err.kind() == ErrorKind::StoreUnavailable => error!(
            "event={event} module=directory status=error site={reference} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
        Err(err) => info!(
            "event={event} module=directory status=rejected site={reference} duration_ms={duration_ms} error_code={}",
            err.code()
        ),
    }
}

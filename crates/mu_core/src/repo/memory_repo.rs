//! In-memory site repository.
//!
//! # Responsibility
//! - Back tests and store-less server runs with a process-local map.
//!
//! # Invariants
//! - Sites are listed in `reference` order.
//! - Each call holds the map guard for its whole duration.

use crate::model::item::{Item, ItemKey};
use crate::model::site::Site;
use crate::repo::{RepoError, RepoResult, SiteRepository};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct SiteEntry {
    site: Site,
    items: Vec<Item>,
}

/// Map-backed repository keyed by site reference.
#[derive(Debug, Default)]
pub struct MemorySiteRepository {
    sites: Mutex<BTreeMap<String, SiteEntry>>,
}

impl MemorySiteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sites(&self) -> RepoResult<MutexGuard<'_, BTreeMap<String, SiteEntry>>> {
        self.sites
            .lock()
            .map_err(|_| RepoError::Poisoned("memory site map"))
    }
}

impl SiteRepository for MemorySiteRepository {
    fn list_sites(&self) -> RepoResult<Vec<Site>> {
        Ok(self
            .sites()?
            .values()
            .map(|entry| entry.site.clone())
            .collect())
    }

    fn get_site(&self, reference: &str) -> RepoResult<Option<Site>> {
        Ok(self
            .sites()?
            .get(reference)
            .map(|entry| entry.site.clone()))
    }

    fn insert_site(&self, site: &Site) -> RepoResult<()> {
        let mut sites = self.sites()?;
        if sites.contains_key(&site.reference) {
            return Err(RepoError::DuplicateSite(site.reference.clone()));
        }
        sites.insert(
            site.reference.clone(),
            SiteEntry {
                site: site.clone(),
                items: Vec::new(),
            },
        );
        Ok(())
    }

    fn save_site(&self, site: &Site) -> RepoResult<bool> {
        match self.sites()?.get_mut(&site.reference) {
            Some(entry) => {
                entry.site = site.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_items(&self, reference: &str) -> RepoResult<Vec<Item>> {
        Ok(self
            .sites()?
            .get(reference)
            .map(|entry| entry.items.clone())
            .unwrap_or_default())
    }

    fn insert_item(&self, item: &Item) -> RepoResult<()> {
        let mut sites = self.sites()?;
        let entry = sites
            .get_mut(&item.reference)
            .ok_or_else(|| RepoError::SiteMissing(item.reference.clone()))?;
        entry.items.push(item.clone());
        Ok(())
    }

    fn replace_item(&self, reference: &str, key: &ItemKey, item: &Item) -> RepoResult<bool> {
        let mut sites = self.sites()?;
        let Some(entry) = sites.get_mut(reference) else {
            return Ok(false);
        };
        match entry.items.iter_mut().find(|stored| key.matches(stored)) {
            Some(stored) => {
                *stored = item.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_item(&self, reference: &str, key: &ItemKey) -> RepoResult<bool> {
        let mut sites = self.sites()?;
        let Some(entry) = sites.get_mut(reference) else {
            return Ok(false);
        };
        match entry.items.iter().position(|stored| key.matches(stored)) {
            Some(index) => {
                entry.items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

//! Core domain logic for the Mu site/item API.
//! This crate is the single source of truth for item identity and merge rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{Config, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::item::{Item, ItemKey, NewItem};
pub use model::patch::{apply_item_patch, apply_site_patch, ItemPatch, MergePolicy, SitePatch};
pub use model::site::{NewSite, Site, SiteIndex};
pub use repo::memory_repo::MemorySiteRepository;
pub use repo::sqlite_repo::SqliteSiteRepository;
pub use repo::{RepoError, RepoResult, SiteRepository};
pub use service::item_directory::{
    now_epoch_ms, Clock, DirectoryError, DirectoryResult, ErrorKind, ItemDirectory,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

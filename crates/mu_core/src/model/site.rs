//! Site domain model.
//!
//! # Responsibility
//! - Define the namespace record that owns an ordered item collection.
//! - Provide the seed payload used by the out-of-band admin path.
//!
//! # Invariants
//! - `reference` is globally unique and never changes after creation.
//! - `created_at` is stamped once by the directory and never rewritten.

use serde::{Deserialize, Serialize};

/// A logical namespace identified by its unique `reference`.
///
/// Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Stable identity key. Immutable after creation.
    pub reference: String,
    #[serde(default)]
    pub url: String,
    /// Display title. Older clients send this as `name`.
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub admin: String,
    pub created_at: i64,
    /// `None` until the first successful update.
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub visited_at: Option<i64>,
    #[serde(default)]
    pub security: bool,
}

/// Seed payload for creating a site out-of-band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    pub reference: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub admin: String,
    #[serde(default)]
    pub security: bool,
}

impl NewSite {
    /// Creates a seed payload with only the identity key set.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Self::default()
        }
    }

    /// Materializes the stored record, stamping `created_at`.
    pub fn into_site(self, created_at: i64) -> Site {
        Site {
            reference: self.reference,
            url: self.url,
            title: self.title,
            admin: self.admin,
            created_at,
            updated_at: None,
            visited_at: None,
            security: self.security,
        }
    }
}

/// Root listing returned by the directory index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteIndex {
    pub message: String,
    /// `url` of every site, in store order.
    pub urls: Vec<String>,
    /// `reference` of every site, in the same order as `urls`.
    pub refs: Vec<String>,
}

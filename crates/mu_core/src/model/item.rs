//! Item domain model and composite key.
//!
//! # Responsibility
//! - Define the content record owned by exactly one site.
//! - Define the `(type, title)` composite key used instead of a surrogate ID.
//!
//! # Invariants
//! - Within one site, `(type, title)` identifies at most one item.
//! - Key comparison is exact and case-sensitive on both fields.
//! - Stored keys have non-blank `type` and `title`; a blank segment could
//!   never be addressed again by key.
//! - `created_at` is set once at creation and never modified.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Content record belonging to one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Owning site reference.
    pub reference: String,
    /// Serialized as `type` to match the external record layout.
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub created_at: i64,
    /// `None` until the first successful update.
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Item {
    /// Returns this item's composite key.
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.kind.as_str(), self.title.as_str())
    }
}

/// Composite natural key of an item within its site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
}

impl ItemKey {
    pub fn new(kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
        }
    }

    /// Exact, case-sensitive match on both key fields.
    pub fn matches(&self, item: &Item) -> bool {
        self.kind == item.kind && self.title == item.title
    }

    /// Name of the first blank (empty or whitespace-only) key field, if any.
    pub fn blank_field(&self) -> Option<&'static str> {
        if self.kind.trim().is_empty() {
            Some("type")
        } else if self.title.trim().is_empty() {
            Some("title")
        } else {
            None
        }
    }
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.title)
    }
}

/// Add payload for a new item. The owning site comes from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl NewItem {
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.kind.as_str(), self.title.as_str())
    }

    /// Materializes the stored record under `reference`, stamping `created_at`.
    pub fn into_item(self, reference: impl Into<String>, created_at: i64) -> Item {
        Item {
            reference: reference.into(),
            kind: self.kind,
            title: self.title,
            content: self.content,
            created_at,
            updated_at: None,
        }
    }
}

//! Partial-update payloads and merge policies.
//!
//! # Responsibility
//! - Define site/item patch shapes where every field is optional.
//! - Apply patches field by field under an explicit `MergePolicy`.
//!
//! # Invariants
//! - Absent (`None`) patch fields never modify the target.
//! - Patches never touch `reference`, `created_at` or `updated_at`.
//! - Item `type`/`title` change only when supplied non-blank, under every
//!   policy.
//! - `SitePatch` has no `reference` field, so an incoming `reference` key
//!   is dropped during deserialization.

use crate::model::item::Item;
use crate::model::site::Site;
use serde::{Deserialize, Serialize};

/// Rule deciding which present patch values overwrite stored fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Any present value overwrites, including `""`, `false` and `0`.
    #[default]
    PresentOverwrites,
    /// Legacy shallow truthy-merge: only non-empty strings, `true` and
    /// non-zero numbers overwrite. Zero values can never be written.
    Truthy,
}

impl MergePolicy {
    /// Parses the configuration spelling of a policy.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" | "present_overwrites" => Some(Self::PresentOverwrites),
            "truthy" | "legacy" => Some(Self::Truthy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PresentOverwrites => "present",
            Self::Truthy => "truthy",
        }
    }

    fn accepts<T: Truthy>(self, value: &T) -> bool {
        match self {
            Self::PresentOverwrites => true,
            Self::Truthy => value.is_truthy(),
        }
    }
}

trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for i64 {
    fn is_truthy(&self) -> bool {
        *self != 0
    }
}

/// Partial site update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<bool>,
}

/// Partial item update. `type`/`title` may be changed to non-blank values;
/// the directory rejects changes that collide with another item's key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ItemPatch {
    /// Patch replacing only `content`.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Merges `patch` into `site` under `policy`.
pub fn apply_site_patch(site: &mut Site, patch: &SitePatch, policy: MergePolicy) {
    merge_field(&mut site.url, &patch.url, policy);
    merge_field(&mut site.title, &patch.title, policy);
    merge_field(&mut site.admin, &patch.admin, policy);
    merge_optional_field(&mut site.visited_at, &patch.visited_at, policy);
    merge_field(&mut site.security, &patch.security, policy);
}

/// Merges `patch` into `item` under `policy`.
pub fn apply_item_patch(item: &mut Item, patch: &ItemPatch, policy: MergePolicy) {
    merge_key_field(&mut item.kind, &patch.kind);
    merge_key_field(&mut item.title, &patch.title);
    merge_field(&mut item.content, &patch.content, policy);
}

fn merge_key_field(target: &mut String, incoming: &Option<String>) {
    if let Some(value) = incoming.as_ref().filter(|value| !value.trim().is_empty()) {
        target.clone_from(value);
    }
}

fn merge_field<T: Truthy + Clone>(target: &mut T, incoming: &Option<T>, policy: MergePolicy) {
    if let Some(value) = incoming {
        if policy.accepts(value) {
            *target = value.clone();
        }
    }
}

fn merge_optional_field<T: Truthy + Clone>(
    target: &mut Option<T>,
    incoming: &Option<T>,
    policy: MergePolicy,
) {
    if let Some(value) = incoming {
        if policy.accepts(value) {
            *target = Some(value.clone());
        }
    }
}

//! Site/item domain model.
//!
//! # Responsibility
//! - Define canonical records shared by repositories, the directory and
//!   the HTTP adapter.
//! - Define partial-update payloads and their merge policies.
//!
//! # Invariants
//! - Sites are identified by `reference`; items by `(reference, type, title)`.
//! - Deletion is a hard delete. There are no tombstones.

pub mod item;
pub mod patch;
pub mod site;

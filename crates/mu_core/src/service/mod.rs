//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into directory-level operations.
//! - Keep HTTP/CLI adapters decoupled from storage details.

pub mod item_directory;

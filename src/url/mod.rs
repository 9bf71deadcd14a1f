//! URL handling module for Sumi-Trawl
//!
//! This module provides URL normalization, link resolution and the naming
//! rules for files derived from URLs and queries.

mod naming;
mod normalize;

pub use naming::{document_file_name, is_document_url, sanitize_name};
pub use normalize::{normalize_url, resolve_link};

//! Core data models used throughout docshelf.
//!
//! These types represent the catalog manifest, installed docsets, indexed
//! entries, and search results that flow through the install and query
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between a docset name and its version inside a slug.
pub const SLUG_SEPARATOR: char = '~';

/// One docset offered by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Display name, e.g. `"Ruby on Rails"`.
    pub name: String,
    /// Catalog identifier, e.g. `"rails~7.1"`.
    pub slug: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub mtime: i64,
    /// Size of the raw bundle in bytes, as advertised by the catalog.
    #[serde(default)]
    pub db_size: i64,
}

/// The full ordered catalog.
pub type Manifest = Vec<ManifestEntry>;

/// Envelope persisted to `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedManifest {
    pub manifest: Manifest,
    pub fetched_at: DateTime<Utc>,
}

/// An installed, locally indexed docset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Docset {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub version: String,
    pub display_name: String,
    pub entry_count: i64,
    pub mtime: i64,
    pub installed_at: i64,
}

impl Docset {
    /// Build the metadata row for a catalog entry about to be indexed.
    pub fn from_manifest(entry: &ManifestEntry, entry_count: usize) -> Self {
        let (name, version) = parse_slug(&entry.slug);
        Self {
            id: 0,
            slug: format_slug(name, version),
            name: name.to_string(),
            version: version.to_string(),
            display_name: entry.name.clone(),
            entry_count: entry_count as i64,
            mtime: entry.mtime,
            installed_at: Utc::now().timestamp(),
        }
    }

    /// Slug derived from name and version.
    pub fn full_slug(&self) -> String {
        format_slug(&self.name, &self.version)
    }
}

/// One documentation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub docset: String,
    pub version: String,
    pub symbol: String,
    pub title: String,
    pub content: String,
    pub path: String,
}

/// A ranked hit. Lower `rank` is more relevant.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub entry: Entry,
    pub rank: f64,
    pub snippet: String,
}

/// Split a slug into `(name, version)` at the last `~`.
///
/// `"rails~7.1"` → `("rails", "7.1")`, `"go"` → `("go", "")`.
pub fn parse_slug(slug: &str) -> (&str, &str) {
    match slug.rfind(SLUG_SEPARATOR) {
        Some(idx) => (&slug[..idx], &slug[idx + 1..]),
        None => (slug, ""),
    }
}

/// Inverse of [`parse_slug`].
pub fn format_slug(name: &str, version: &str) -> String {
    if version.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", name, SLUG_SEPARATOR, version)
    }
}

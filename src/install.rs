//! Install/update pipeline.
//!
//! ```text
//! Catalog ──bundle──▶ Storage (raw copy)
//!    │
//!    └──index.json──▶ build_entries (convert + symbol lookup) ──▶ Indexer
//! ```
//!
//! A raw bundle is parsed as one JSON object held entirely in memory;
//! bundles are bounded by [`MAX_BUNDLE_BYTES`](crate::devdocs::MAX_BUNDLE_BYTES).
//!
//! Network and storage failures abort the install before anything is
//! indexed. The raw bundle may already be on disk at that point; a retry
//! overwrites it. Pages that fail conversion are skipped and the install
//! still succeeds with a smaller entry count.
//!
//! Installs of the same slug are serialized; different slugs run freely.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::convert;
use crate::devdocs::{Catalog, IndexEntry, StructuralIndex};
use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::models::{parse_slug, Docset, Entry, ManifestEntry};
use crate::progress::{InstallEvent, InstallPhase, NoProgress, ProgressSink};
use crate::storage::{self, Storage};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub slug: String,
    pub entry_count: usize,
    /// Pages dropped because they could not be converted or duplicated another path.
    pub skipped: usize,
}

pub struct Installer {
    catalog: Arc<dyn Catalog>,
    storage: Storage,
    indexer: Indexer,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Installer {
    pub fn new(catalog: Arc<dyn Catalog>, storage: Storage, indexer: Indexer) -> Self {
        Self {
            catalog,
            storage,
            indexer,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Download, convert, store, and index one docset.
    pub async fn install(
        &self,
        entry: &ManifestEntry,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<InstallReport> {
        storage::validate_slug(&entry.slug)?;
        let lock = self.slug_lock(&entry.slug);
        let _guard = lock.lock().await;

        let sink: &dyn ProgressSink = progress.unwrap_or(&NoProgress);
        let total = entry.db_size;
        let enter = |phase: InstallPhase| sink.report(InstallEvent::Phase { phase, total });

        enter(InstallPhase::Downloading);
        let on_chunk = |downloaded: u64, total: u64| {
            sink.report(InstallEvent::Downloading { downloaded, total });
        };
        let data = self.catalog.fetch_raw_bundle(&entry.slug, &on_chunk).await?;

        enter(InstallPhase::Processing);
        self.storage.save(&entry.slug, &data).await?;

        let index = self.catalog.fetch_structural_index(&entry.slug).await?;
        let (entries, skipped) = build_entries(&entry.slug, &data, &index)?;
        drop(data);

        enter(InstallPhase::Indexing);
        let docset = Docset::from_manifest(entry, entries.len());
        self.indexer.index_docset(&docset, &entries).await?;

        enter(InstallPhase::Done);
        sink.report(InstallEvent::Finished {
            slug: entry.slug.clone(),
            entry_count: entries.len(),
        });

        if skipped > 0 {
            tracing::info!(slug = %entry.slug, skipped, "some pages were skipped");
        }

        Ok(InstallReport {
            slug: entry.slug.clone(),
            entry_count: entries.len(),
            skipped,
        })
    }

    fn slug_lock(&self, slug: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(slug.to_string()).or_default().clone()
    }
}

/// Turn a raw bundle into index entries.
///
/// Returns the entries and the number of pages skipped.
pub fn build_entries(slug: &str, data: &[u8], index: &StructuralIndex) -> Result<(Vec<Entry>, usize)> {
    let bundle: BTreeMap<String, serde_json::Value> =
        serde_json::from_slice(data).map_err(|source| Error::Decode {
            what: "docset bundle",
            source,
        })?;

    let (name, version) = parse_slug(slug);
    let symbols = symbol_table(index);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries = Vec::with_capacity(bundle.len());
    let mut skipped = 0usize;

    for (raw_path, value) in &bundle {
        let path = strip_fragment(raw_path);
        if seen.contains(path) {
            tracing::debug!(slug, path = %raw_path, "duplicate page path");
            skipped += 1;
            continue;
        }

        let Some(html) = value.as_str() else {
            tracing::debug!(slug, path = %raw_path, "page is not a string");
            skipped += 1;
            continue;
        };

        let content = match convert::convert(html) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(slug, path = %raw_path, error = %e, "skipping page");
                skipped += 1;
                continue;
            }
        };

        let symbol = symbols
            .get(path)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| path.to_string());

        seen.insert(path);
        entries.push(Entry {
            docset: name.to_string(),
            version: version.to_string(),
            title: symbol.clone(),
            symbol,
            content,
            path: path.to_string(),
        });
    }

    Ok((entries, skipped))
}

/// Map fragment-free paths to their structural-index entry.
///
/// An entry pointing at the page itself beats entries pointing at anchors
/// within it; among anchors the first one listed wins.
fn symbol_table(index: &StructuralIndex) -> HashMap<&str, &IndexEntry> {
    let mut table: HashMap<&str, (&IndexEntry, bool)> = HashMap::new();

    for entry in &index.entries {
        let key = strip_fragment(&entry.path);
        let exact = key.len() == entry.path.len();
        match table.get(key) {
            Some((_, true)) => {}
            Some((_, false)) if !exact => {}
            _ => {
                table.insert(key, (entry, exact));
            }
        }
    }

    table.into_iter().map(|(k, (e, _))| (k, e)).collect()
}

fn strip_fragment(path: &str) -> &str {
    match path.find('#') {
        Some(idx) => &path[..idx],
        None => path,
    }
}

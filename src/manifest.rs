//! Time-based disk cache in front of the catalog manifest.
//!
//! `get` serves the on-disk copy while it is younger than `max_age`,
//! otherwise refetches. When a refetch fails the last good snapshot is
//! served instead (first the one held in memory, then an expired disk
//! copy); only a cold start with no connectivity and no cache errors.

use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::devdocs::Catalog;
use crate::error::{Error, Result};
use crate::models::{CachedManifest, Manifest, ManifestEntry};

/// Default freshness window.
pub const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// An immutable view of the manifest as of `fetched_at`.
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    pub manifest: Arc<Manifest>,
    pub fetched_at: DateTime<Utc>,
}

impl ManifestSnapshot {
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    pub fn find(&self, slug: &str) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|e| e.slug == slug)
    }

    /// Case-insensitive substring match on slug or display name.
    pub fn filter(&self, filter: &str) -> Vec<&ManifestEntry> {
        let needle = filter.to_lowercase();
        self.manifest
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.slug.to_lowercase().contains(&needle)
                    || e.name.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

impl From<CachedManifest> for ManifestSnapshot {
    fn from(cached: CachedManifest) -> Self {
        Self {
            manifest: Arc::new(cached.manifest),
            fetched_at: cached.fetched_at,
        }
    }
}

pub struct ManifestCache {
    path: PathBuf,
    max_age: Duration,
    catalog: Arc<dyn Catalog>,
    current: RwLock<Option<ManifestSnapshot>>,
}

impl ManifestCache {
    pub fn new(path: impl Into<PathBuf>, catalog: Arc<dyn Catalog>) -> Self {
        Self::with_max_age(path, catalog, Duration::seconds(DEFAULT_MAX_AGE_SECS))
    }

    pub fn with_max_age(path: impl Into<PathBuf>, catalog: Arc<dyn Catalog>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
            catalog,
            current: RwLock::new(None),
        }
    }

    pub async fn get(&self, force_refresh: bool) -> Result<ManifestSnapshot> {
        self.get_at(force_refresh, Utc::now()).await
    }

    /// [`get`](Self::get) evaluated against an explicit clock reading.
    pub async fn get_at(&self, force_refresh: bool, now: DateTime<Utc>) -> Result<ManifestSnapshot> {
        if !force_refresh {
            if let Some(cached) = self.load_from_disk().await {
                if now - cached.fetched_at <= self.max_age {
                    let snapshot = ManifestSnapshot::from(cached);
                    *self.current.write().await = Some(snapshot.clone());
                    return Ok(snapshot);
                }
            }
        }

        match self.catalog.fetch_manifest().await {
            Ok(manifest) => {
                let snapshot = ManifestSnapshot {
                    manifest: Arc::new(manifest),
                    fetched_at: now,
                };
                *self.current.write().await = Some(snapshot.clone());

                if let Err(e) = self.save_to_disk(&snapshot).await {
                    tracing::warn!(path = %self.path.display(), error = %e, "could not write manifest cache");
                }
                tracing::info!(entries = snapshot.manifest.len(), "manifest refreshed");
                Ok(snapshot)
            }
            Err(err) => {
                if let Some(snapshot) = self.current.read().await.clone() {
                    tracing::warn!(error = %err, fetched_at = %snapshot.fetched_at, "serving stale manifest");
                    return Ok(snapshot);
                }
                if let Some(cached) = self.load_from_disk().await {
                    let snapshot = ManifestSnapshot::from(cached);
                    tracing::warn!(error = %err, fetched_at = %snapshot.fetched_at, "serving expired manifest cache");
                    *self.current.write().await = Some(snapshot.clone());
                    return Ok(snapshot);
                }
                Err(err)
            }
        }
    }

    /// Last snapshot served, if any.
    pub async fn current(&self) -> Option<ManifestSnapshot> {
        self.current.read().await.clone()
    }

    async fn load_from_disk(&self) -> Option<CachedManifest> {
        let data = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice::<CachedManifest>(&data) {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "ignoring unreadable manifest cache");
                None
            }
        }
    }

    async fn save_to_disk(&self, snapshot: &ManifestSnapshot) -> Result<()> {
        let cached = CachedManifest {
            manifest: snapshot.manifest.as_ref().clone(),
            fetched_at: snapshot.fetched_at,
        };
        let data = serde_json::to_vec(&cached).map_err(|source| Error::Decode {
            what: "manifest cache",
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(parent, e))?;
        }

        // Write-then-rename so readers never see a torn file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| Error::storage(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::storage(&self.path, e))
    }
}

//! The public operations consumed by front ends (CLI, TUI).
//!
//! [`App`] wires the components together over one data directory and is
//! the only path by which callers touch the index, the raw bundle store,
//! or the manifest cache.

use anyhow::Context;
use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::{Config, Paths};
use crate::devdocs::{Catalog, DevDocsClient};
use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::install::{InstallReport, Installer};
use crate::manifest::{ManifestCache, ManifestSnapshot};
use crate::models::{Docset, Entry, ManifestEntry, SearchResult};
use crate::progress::ProgressSink;
use crate::search::Searcher;
use crate::storage::{self, Storage};
use crate::{db, migrate};

/// Result of re-installing one docset during `update_all`.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub slug: String,
    pub result: Result<InstallReport>,
}

pub struct App {
    paths: Paths,
    pool: SqlitePool,
    manifest: ManifestCache,
    storage: Storage,
    indexer: Indexer,
    searcher: Searcher,
    installer: Installer,
}

impl App {
    /// Open the app against the real remote catalog.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let client = DevDocsClient::new(&config.remote).context("Failed to build HTTP client")?;
        Self::with_catalog(config, Arc::new(client)).await
    }

    /// Open the app against any [`Catalog`] implementation.
    pub async fn with_catalog(config: &Config, catalog: Arc<dyn Catalog>) -> anyhow::Result<Self> {
        let paths = config.paths();
        paths.ensure_dirs()?;

        let pool = db::connect(&paths.db_path)
            .await
            .with_context(|| format!("Failed to open index: {}", paths.db_path.display()))?;
        migrate::run_migrations(&pool)
            .await
            .context("Failed to initialise index schema")?;

        let manifest = ManifestCache::with_max_age(
            &paths.manifest_path,
            catalog.clone(),
            Duration::seconds(config.cache.manifest_max_age_secs),
        );
        let storage = Storage::new(&paths.docs_dir);
        let indexer = Indexer::new(pool.clone());
        let searcher = Searcher::with_limits(
            pool.clone(),
            config.search.default_limit,
            config.search.list_limit,
        );
        let installer = Installer::new(catalog, storage.clone(), indexer.clone());

        Ok(Self {
            paths,
            pool,
            manifest,
            storage,
            indexer,
            searcher,
            installer,
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub async fn list_installed_docsets(&self) -> Result<Vec<Docset>> {
        self.searcher.list_docsets().await
    }

    pub async fn list_available_docsets(&self, force_refresh: bool) -> Result<ManifestSnapshot> {
        self.manifest.get(force_refresh).await
    }

    pub async fn find_available(&self, slug: &str) -> Result<ManifestEntry> {
        let snapshot = self.manifest.get(false).await?;
        snapshot
            .find(slug)
            .cloned()
            .ok_or_else(|| Error::not_found("docset", slug))
    }

    /// Manifest entries whose slug or display name contains `filter`.
    pub async fn filter_available(&self, filter: &str, force_refresh: bool) -> Result<Vec<ManifestEntry>> {
        let snapshot = self.manifest.get(force_refresh).await?;
        Ok(snapshot.filter(filter).into_iter().cloned().collect())
    }

    pub async fn install_docset(
        &self,
        slug: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<InstallReport> {
        let entry = self.find_available(slug).await?;
        self.installer.install(&entry, progress).await
    }

    /// Re-install a docset without progress output.
    pub async fn update_docset(&self, slug: &str) -> Result<InstallReport> {
        self.install_docset(slug, None).await
    }

    /// Re-install every installed docset, continuing past failures.
    pub async fn update_all(&self) -> Result<Vec<UpdateOutcome>> {
        let docsets = self.list_installed_docsets().await?;
        let mut outcomes = Vec::with_capacity(docsets.len());
        for docset in docsets {
            let result = self.update_docset(&docset.slug).await;
            if let Err(e) = &result {
                tracing::warn!(slug = %docset.slug, error = %e, "update failed");
            }
            outcomes.push(UpdateOutcome {
                slug: docset.slug,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Drop a docset from the index, then delete its raw bundle.
    pub async fn remove_docset(&self, slug: &str) -> Result<()> {
        storage::validate_slug(slug)?;
        self.indexer.remove_docset(slug).await?;
        self.storage.delete(slug).await
    }

    pub async fn search(
        &self,
        query: &str,
        docset: &str,
        version: &str,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        self.searcher.search(query, docset, version, limit).await
    }

    pub async fn list_entries(&self, docset: &str, version: &str, limit: i64) -> Result<Vec<Entry>> {
        self.searcher.list_entries(docset, version, limit).await
    }

    pub async fn get_entry(&self, docset: &str, version: &str, path: &str) -> Result<Entry> {
        self.searcher.get_entry(docset, version, path).await
    }

    /// The raw bundle kept on disk for an installed docset.
    pub async fn raw_bundle(&self, slug: &str) -> Result<Vec<u8>> {
        self.storage.load(slug).await
    }
}

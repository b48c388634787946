//! Remote catalog and content client.
//!
//! Three resources are fetched over HTTP:
//!
//! | Resource | URL |
//! |----------|-----|
//! | Manifest | `<catalog>/docs.json` |
//! | Raw bundle | `<content>/<slug>/db.json` |
//! | Structural index | `<content>/<slug>/index.json` |
//!
//! Every request carries the configured timeout. Transport failures,
//! non-2xx statuses and bodies that do not match the expected JSON shape
//! all surface as [`Error::Network`].
//!
//! The [`Catalog`] trait is the seam the installer depends on, so the
//! pipeline can run against an in-memory source.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::Manifest;

/// Upper bound on a raw bundle held in memory during install.
pub const MAX_BUNDLE_BYTES: u64 = 512 * 1024 * 1024;

/// Per-docset listing of symbol names and the content paths they live at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralIndex {
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Byte-level download progress: `(downloaded, total)`. `total` is 0 when unknown.
pub type ChunkProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// A source of docset manifests and content.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn fetch_manifest(&self) -> Result<Manifest>;

    /// Download a docset's raw bundle, reporting progress after each chunk.
    async fn fetch_raw_bundle(&self, slug: &str, on_progress: ChunkProgress<'_>)
        -> Result<Vec<u8>>;

    async fn fetch_structural_index(&self, slug: &str) -> Result<StructuralIndex>;
}

/// HTTP client for the DevDocs catalog and content hosts.
#[derive(Debug, Clone)]
pub struct DevDocsClient {
    http: reqwest::Client,
    catalog_url: String,
    content_url: String,
}

impl DevDocsClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("docshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(&config.catalog_url, e))?;

        Ok(Self {
            http,
            catalog_url: config.catalog_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/docs.json", self.catalog_url)
    }

    pub fn bundle_url(&self, slug: &str) -> String {
        format!("{}/{}/db.json", self.content_url, slug)
    }

    pub fn index_url(&self, slug: &str) -> String {
        format!("{}/{}/index.json", self.content_url, slug)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Network {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("unexpected status {}", status),
            });
        }

        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let resp = self.get(url).await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| Error::network(url, e))?;

        serde_json::from_slice(&body).map_err(|e| Error::Network {
            url: url.to_string(),
            status: Some(status),
            message: format!("malformed {}: {}", what, e),
        })
    }
}

#[async_trait]
impl Catalog for DevDocsClient {
    async fn fetch_manifest(&self) -> Result<Manifest> {
        let url = self.manifest_url();
        let manifest: Manifest = self.get_json(&url, "manifest").await?;
        tracing::debug!(entries = manifest.len(), "fetched manifest");
        Ok(manifest)
    }

    async fn fetch_raw_bundle(
        &self,
        slug: &str,
        on_progress: ChunkProgress<'_>,
    ) -> Result<Vec<u8>> {
        let url = self.bundle_url(slug);
        let mut resp = self.get(&url).await?;

        let total = resp.content_length().unwrap_or(0);
        let mut data = Vec::with_capacity(total.min(MAX_BUNDLE_BYTES) as usize);
        let mut downloaded = 0u64;

        while let Some(chunk) = resp.chunk().await.map_err(|e| Error::network(&url, e))? {
            downloaded += chunk.len() as u64;
            if downloaded > MAX_BUNDLE_BYTES {
                return Err(Error::Network {
                    url,
                    status: None,
                    message: format!("bundle exceeds {} bytes", MAX_BUNDLE_BYTES),
                });
            }
            data.extend_from_slice(&chunk);
            on_progress(downloaded, total);
        }

        tracing::debug!(slug, bytes = downloaded, "downloaded raw bundle");
        Ok(data)
    }

    async fn fetch_structural_index(&self, slug: &str) -> Result<StructuralIndex> {
        let url = self.index_url(slug);
        self.get_json(&url, "structural index").await
    }
}

//! On-disk copies of raw docset bundles.
//!
//! Layout: `<base>/<name>/<version>/db.json`, or `<base>/<name>/db.json`
//! for unversioned docsets. Slugs are checked before they become paths;
//! see [`validate_slug`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::parse_slug;

const BUNDLE_FILE: &str = "db.json";

#[derive(Debug, Clone)]
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write the raw bundle, replacing any previous copy.
    pub async fn save(&self, slug: &str, data: &[u8]) -> Result<()> {
        let dir = self.docset_dir(slug)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(&dir, e))?;

        let path = dir.join(BUNDLE_FILE);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| Error::storage(&path, e))
    }

    pub async fn load(&self, slug: &str) -> Result<Vec<u8>> {
        let path = self.bundle_path(slug)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found("bundle", slug)),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    /// Remove a docset's raw bundle. Missing files are not an error.
    ///
    /// A versioned docset owns `<name>/<version>/` and the whole directory
    /// goes. An unversioned docset shares `<name>/` with any versioned
    /// siblings, so only its `db.json` is removed. An emptied `<name>/`
    /// directory is cleaned up either way.
    pub async fn delete(&self, slug: &str) -> Result<()> {
        let (name, version) = parse_slug(slug);
        let dir = self.docset_dir(slug)?;

        let target = if version.is_empty() {
            dir.join(BUNDLE_FILE)
        } else {
            dir
        };
        let removed = if version.is_empty() {
            tokio::fs::remove_file(&target).await
        } else {
            tokio::fs::remove_dir_all(&target).await
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage(&target, e)),
        }

        // No-op while other versions remain.
        let _ = tokio::fs::remove_dir(self.base_dir.join(name)).await;
        Ok(())
    }

    /// Whether a bundle is stored for `slug`. Invalid slugs never exist.
    pub async fn exists(&self, slug: &str) -> bool {
        match self.bundle_path(slug) {
            Ok(path) => tokio::fs::metadata(path).await.is_ok(),
            Err(_) => false,
        }
    }

    pub fn bundle_path(&self, slug: &str) -> Result<PathBuf> {
        Ok(self.docset_dir(slug)?.join(BUNDLE_FILE))
    }

    fn docset_dir(&self, slug: &str) -> Result<PathBuf> {
        validate_slug(slug)?;
        let (name, version) = parse_slug(slug);
        if version.is_empty() {
            Ok(self.base_dir.join(name))
        } else {
            Ok(self.base_dir.join(name).join(version))
        }
    }
}

/// Reject slugs whose parts cannot be used as a single path component.
///
/// The name must be non-empty; neither name nor version may be `.` or
/// `..` or contain a path separator or NUL.
pub fn validate_slug(slug: &str) -> Result<()> {
    let (name, version) = parse_slug(slug);
    let bad_part = |part: &str| {
        part == "." || part == ".." || part.contains(['/', '\\', '\0'])
    };

    if name.is_empty() || bad_part(name) || bad_part(version) {
        return Err(Error::not_found("docset", slug));
    }
    Ok(())
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `<config dir>/docshelf/config.toml`, or `./docshelf.toml` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("docshelf").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("docshelf.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("docshelf"))
        .unwrap_or_else(|| PathBuf::from(".docshelf"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "default_content_url")]
    pub content_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            content_url: default_content_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://devdocs.io".to_string()
}
fn default_content_url() -> String {
    "https://documents.devdocs.io".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_manifest_max_age")]
    pub manifest_max_age_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            manifest_max_age_secs: default_manifest_max_age(),
        }
    }
}

fn default_manifest_max_age() -> i64 {
    24 * 60 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: i64,
    #[serde(default = "default_list_limit")]
    pub list_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            list_limit: default_list_limit(),
        }
    }
}

fn default_search_limit() -> i64 {
    50
}
fn default_list_limit() -> i64 {
    100
}

/// Filesystem locations derived from `[paths].data_dir`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub db_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl Paths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            docs_dir: data_dir.join("docs"),
            db_path: data_dir.join("index.sqlite"),
            manifest_path: data_dir.join("manifest.json"),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.docs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

impl Config {
    /// Configuration rooted at an explicit data directory, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig {
                data_dir: data_dir.into(),
            },
            ..Self::default()
        }
    }

    pub fn paths(&self) -> Paths {
        Paths::new(&self.paths.data_dir)
    }
}

/// Load the config file at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.remote.timeout_secs == 0 {
        anyhow::bail!("remote.timeout_secs must be > 0");
    }

    for (key, url) in [
        ("remote.catalog_url", &config.remote.catalog_url),
        ("remote.content_url", &config.remote.content_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("{} must be an http(s) URL, got '{}'", key, url);
        }
    }

    if config.cache.manifest_max_age_secs < 0 {
        anyhow::bail!("cache.manifest_max_age_secs must be >= 0");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }
    if config.search.list_limit < 1 {
        anyhow::bail!("search.list_limit must be >= 1");
    }

    Ok(())
}

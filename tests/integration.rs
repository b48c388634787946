use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use docshelf::config::Config;
use docshelf::devdocs::{Catalog, DevDocsClient};
use docshelf::progress::{ChannelProgress, InstallEvent, InstallPhase, ProgressSink};
use docshelf::{App, Error};

// ============ Fake remote ============

struct Remote {
    manifest: String,
    bundles: HashMap<String, (String, String)>,
    manifest_hits: AtomicUsize,
}

async fn manifest(State(remote): State<Arc<Remote>>) -> String {
    remote.manifest_hits.fetch_add(1, Ordering::SeqCst);
    remote.manifest.clone()
}

async fn bundle(
    State(remote): State<Arc<Remote>>,
    UrlPath(slug): UrlPath<String>,
) -> Result<String, StatusCode> {
    remote
        .bundles
        .get(&slug)
        .map(|(db, _)| db.clone())
        .ok_or(StatusCode::NOT_FOUND)
}

async fn index(
    State(remote): State<Arc<Remote>>,
    UrlPath(slug): UrlPath<String>,
) -> Result<String, StatusCode> {
    remote
        .bundles
        .get(&slug)
        .map(|(_, idx)| idx.clone())
        .ok_or(StatusCode::NOT_FOUND)
}

fn manifest_json() -> String {
    serde_json::json!([
        { "name": "Go", "slug": "go", "type": "go", "release": "1.22", "mtime": 1700000000, "db_size": 1000 },
        { "name": "JavaScript", "slug": "javascript", "type": "mdn", "mtime": 1700000001, "db_size": 1000 },
        { "name": "Ruby on Rails", "slug": "rails~7.1", "type": "rdoc", "version": "7.1", "mtime": 1700000002, "db_size": 2000 },
        { "name": "Missing", "slug": "missing~1", "type": "none", "version": "1", "mtime": 1, "db_size": 10 }
    ])
    .to_string()
}

fn fixture_bundles() -> HashMap<String, (String, String)> {
    let mut bundles = HashMap::new();

    bundles.insert(
        "rails~7.1".to_string(),
        (
            serde_json::json!({
                "active_record/base": "<h1>ActiveRecord::Base</h1><p>Active Record objects map database rows to models.</p>",
                "action_controller/metal": "<h1>Metal</h1><p>The bare controller used for rendering responses.</p>",
            })
            .to_string(),
            serde_json::json!({
                "entries": [
                    { "name": "ActiveRecord::Base", "path": "active_record/base", "type": "Models" },
                    { "name": "ActionController::Metal#render", "path": "action_controller/metal#method-i-render", "type": "Controllers" },
                ]
            })
            .to_string(),
        ),
    );

    bundles.insert(
        "go".to_string(),
        (
            serde_json::json!({
                "fmt/index": "<p>Package fmt implements formatted I/O with functions like Println.</p>",
                "net/http/index": "<p>Package http provides HTTP client and server implementations.</p>",
            })
            .to_string(),
            serde_json::json!({
                "entries": [
                    { "name": "fmt", "path": "fmt/index", "type": "Packages" },
                    { "name": "net/http", "path": "net/http/index", "type": "Packages" },
                ]
            })
            .to_string(),
        ),
    );

    bundles.insert(
        "javascript".to_string(),
        (
            serde_json::json!({
                "global_objects/array/map": "<p>The map() method creates a new array. Server code can use it too.</p>",
            })
            .to_string(),
            serde_json::json!({
                "entries": [
                    { "name": "Array.prototype.map()", "path": "global_objects/array/map", "type": "Array" },
                ]
            })
            .to_string(),
        ),
    );

    bundles
}

async fn spawn_remote() -> (String, Arc<Remote>) {
    let remote = Arc::new(Remote {
        manifest: manifest_json(),
        bundles: fixture_bundles(),
        manifest_hits: AtomicUsize::new(0),
    });

    let router = Router::new()
        .route("/docs.json", get(manifest))
        .route("/{slug}/db.json", get(bundle))
        .route("/{slug}/index.json", get(index))
        .with_state(remote.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), remote)
}

fn test_config(data_dir: &Path, base_url: &str) -> Config {
    let mut config = Config::with_data_dir(data_dir);
    config.remote.catalog_url = base_url.to_string();
    config.remote.content_url = base_url.to_string();
    config.remote.timeout_secs = 5;
    config
}

async fn open_app() -> (TempDir, App, Arc<Remote>) {
    let tmp = TempDir::new().unwrap();
    let (url, remote) = spawn_remote().await;
    let app = App::open(&test_config(tmp.path(), &url)).await.unwrap();
    (tmp, app, remote)
}

// ============ Library ============

#[tokio::test]
async fn client_fetches_manifest_and_index() {
    let (url, _remote) = spawn_remote().await;
    let mut config = Config::default();
    config.remote.catalog_url = url.clone();
    config.remote.content_url = url;
    let client = DevDocsClient::new(&config.remote).unwrap();

    let manifest = client.fetch_manifest().await.unwrap();
    assert_eq!(manifest.len(), 4);
    assert_eq!(manifest[2].slug, "rails~7.1");
    assert_eq!(manifest[2].kind, "rdoc");

    let index = client.fetch_structural_index("go").await.unwrap();
    assert_eq!(index.entries.len(), 2);
}

#[tokio::test]
async fn missing_remote_resource_is_network_error_with_status() {
    let (url, _remote) = spawn_remote().await;
    let mut config = Config::default();
    config.remote.content_url = url;
    let client = DevDocsClient::new(&config.remote).unwrap();

    let noop = |_: u64, _: u64| {};
    let err = client.fetch_raw_bundle("nope", &noop).await.unwrap_err();
    match err {
        Error::Network { status, url, .. } => {
            assert_eq!(status, Some(404));
            assert!(url.ends_with("/nope/db.json"));
        }
        other => panic!("expected network error, got {:?}", other),
    }
}

#[tokio::test]
async fn install_then_search_and_show() {
    let (tmp, app, _remote) = open_app().await;

    let report = app.install_docset("rails~7.1", None).await.unwrap();
    assert_eq!(report.entry_count, 2);
    assert_eq!(report.skipped, 0);

    let installed = app.list_installed_docsets().await.unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].slug, "rails~7.1");
    assert_eq!(installed[0].name, "rails");
    assert_eq!(installed[0].version, "7.1");
    assert_eq!(installed[0].display_name, "Ruby on Rails");
    assert_eq!(installed[0].entry_count, 2);

    // raw bundle kept under docs/<name>/<version>/db.json
    assert!(tmp.path().join("docs/rails/7.1/db.json").exists());
    let raw = app.raw_bundle("rails~7.1").await.unwrap();
    assert!(String::from_utf8(raw).unwrap().contains("ActiveRecord::Base"));

    let results = app.search("record", "", "", 0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.symbol, "ActiveRecord::Base");
    assert!(results[0].snippet.contains("<mark>"));

    // anchor-only index entries still label their page
    let entry = app
        .get_entry("rails", "7.1", "action_controller/metal")
        .await
        .unwrap();
    assert_eq!(entry.symbol, "ActionController::Metal#render");
    assert!(entry.content.contains("bare controller"));
    assert!(!entry.content.contains("<p>"));
}

#[tokio::test]
async fn scoped_search_only_returns_that_docset() {
    let (_tmp, app, _remote) = open_app().await;
    app.install_docset("go", None).await.unwrap();
    app.install_docset("javascript", None).await.unwrap();

    let global = app.search("server", "", "", 0).await.unwrap();
    assert_eq!(global.len(), 2);
    assert!(global.windows(2).all(|w| w[0].rank <= w[1].rank));

    let scoped = app.search("server", "go", "", 0).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].entry.docset, "go");
    assert_eq!(scoped[0].entry.path, "net/http/index");

    let entries = app.list_entries("go", "", 0).await.unwrap();
    let symbols: Vec<_> = entries.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["fmt", "net/http"]);
}

#[tokio::test]
async fn remove_clears_index_and_bundle() {
    let (tmp, app, _remote) = open_app().await;
    app.install_docset("go", None).await.unwrap();
    app.install_docset("rails~7.1", None).await.unwrap();

    app.remove_docset("go").await.unwrap();

    let installed = app.list_installed_docsets().await.unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].slug, "rails~7.1");
    assert!(app.search("Println", "", "", 0).await.unwrap().is_empty());
    assert!(!tmp.path().join("docs/go/db.json").exists());

    // removing again is harmless
    app.remove_docset("go").await.unwrap();
}

#[tokio::test]
async fn remove_refuses_path_like_slugs() {
    let (tmp, app, _remote) = open_app().await;
    app.install_docset("go", None).await.unwrap();

    for slug in ["..", ".", "docs/../..", "go~.."] {
        let err = app.remove_docset(slug).await.unwrap_err();
        assert!(err.is_not_found(), "{}: {}", slug, err);
    }

    assert!(tmp.path().join("index.sqlite").is_file());
    assert!(tmp.path().join("docs/go/db.json").is_file());
    assert_eq!(app.list_installed_docsets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let (_tmp, app, _remote) = open_app().await;
    let err = app.install_docset("cobol~85", None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn failed_download_leaves_nothing_indexed() {
    let (tmp, app, _remote) = open_app().await;
    let err = app.install_docset("missing~1", None).await.unwrap_err();
    assert!(matches!(err, Error::Network { status: Some(404), .. }));

    assert!(app.list_installed_docsets().await.unwrap().is_empty());
    assert!(!tmp.path().join("docs/missing/1/db.json").exists());
}

#[tokio::test]
async fn manifest_is_cached_between_calls() {
    let (tmp, app, remote) = open_app().await;

    let first = app.list_available_docsets(false).await.unwrap();
    let second = app.list_available_docsets(false).await.unwrap();
    assert_eq!(first.entries().len(), 4);
    assert_eq!(second.entries().len(), 4);
    assert_eq!(remote.manifest_hits.load(Ordering::SeqCst), 1);
    assert!(tmp.path().join("manifest.json").exists());

    app.list_available_docsets(true).await.unwrap();
    assert_eq!(remote.manifest_hits.load(Ordering::SeqCst), 2);

    let rails = app.filter_available("RAILS", false).await.unwrap();
    assert_eq!(rails.len(), 1);
    assert_eq!(rails[0].slug, "rails~7.1");
}

#[tokio::test]
async fn manifest_cache_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let (url, remote) = spawn_remote().await;
    let config = test_config(tmp.path(), &url);

    let app = App::open(&config).await.unwrap();
    app.list_available_docsets(false).await.unwrap();
    app.close().await;

    let app = App::open(&config).await.unwrap();
    let snapshot = app.list_available_docsets(false).await.unwrap();
    assert_eq!(snapshot.entries().len(), 4);
    assert_eq!(remote.manifest_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn install_reports_progress_in_order() {
    let (_tmp, app, _remote) = open_app().await;
    let (sink, mut rx) = ChannelProgress::new();

    app.install_docset("go", Some(&sink as &dyn ProgressSink)).await.unwrap();
    drop(sink);

    let mut phases = Vec::new();
    let mut last_downloaded = 0;
    let mut finished = false;
    while let Some(event) = rx.recv().await {
        match event {
            InstallEvent::Phase { phase, total } => {
                assert_eq!(total, 1000);
                phases.push(phase);
            }
            InstallEvent::Downloading { downloaded, .. } => {
                assert!(downloaded >= last_downloaded);
                last_downloaded = downloaded;
            }
            InstallEvent::Finished { slug, entry_count } => {
                assert_eq!(slug, "go");
                assert_eq!(entry_count, 2);
                finished = true;
            }
        }
    }

    assert_eq!(
        phases,
        vec![
            InstallPhase::Downloading,
            InstallPhase::Processing,
            InstallPhase::Indexing,
            InstallPhase::Done,
        ]
    );
    assert!(last_downloaded > 0);
    assert!(finished);
}

#[tokio::test]
async fn update_all_reinstalls_every_docset() {
    let (_tmp, app, _remote) = open_app().await;
    app.install_docset("go", None).await.unwrap();
    app.install_docset("javascript", None).await.unwrap();

    let outcomes = app.update_all().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let installed = app.list_installed_docsets().await.unwrap();
    assert_eq!(installed.len(), 2);
    assert_eq!(installed[0].entry_count, 2);
}

// ============ Binary ============

fn docshelf_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docshelf");
    path
}

fn write_cli_config(root: &Path, base_url: &str) -> PathBuf {
    let config_path = root.join("docshelf.toml");
    fs::write(
        &config_path,
        format!(
            r#"[paths]
data_dir = "{}/data"

[remote]
catalog_url = "{url}"
content_url = "{url}"
timeout_secs = 5
"#,
            root.display(),
            url = base_url
        ),
    )
    .unwrap();
    config_path
}

fn run_docshelf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docshelf_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docshelf binary at {:?}: {}", binary, e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_install_search_remove() {
    let tmp = TempDir::new().unwrap();
    let (url, _remote) = spawn_remote().await;
    let config_path = write_cli_config(tmp.path(), &url);

    let output = tokio::task::spawn_blocking(move || {
        let install = run_docshelf(&config_path, &["install", "go"]);
        let list = run_docshelf(&config_path, &["list"]);
        let search = run_docshelf(&config_path, &["search", "Println", "--json"]);
        let show = run_docshelf(&config_path, &["show", "go", "fmt/index"]);
        let remove = run_docshelf(&config_path, &["remove", "go"]);
        let empty = run_docshelf(&config_path, &["list"]);
        (install, list, search, show, remove, empty)
    })
    .await
    .unwrap();
    let (install, list, search, show, remove, empty) = output;

    assert!(install.2, "install failed: {}", install.1);
    assert!(install.0.contains("installed go (2 entries)"));

    assert!(list.2);
    assert!(list.0.contains("go"));

    assert!(search.2, "search failed: {}", search.1);
    let hits: serde_json::Value = serde_json::from_str(&search.0).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["path"], "fmt/index");

    assert!(show.2);
    assert!(show.0.starts_with("# fmt"));

    assert!(remove.2);
    assert!(empty.0.contains("No docsets installed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_show_missing_entry_fails() {
    let tmp = TempDir::new().unwrap();
    let (url, _remote) = spawn_remote().await;
    let config_path = write_cli_config(tmp.path(), &url);

    let (_, stderr, ok) = tokio::task::spawn_blocking(move || {
        run_docshelf(&config_path, &["show", "go", "nope"])
    })
    .await
    .unwrap();

    assert!(!ok);
    assert!(stderr.contains("not found"));
}

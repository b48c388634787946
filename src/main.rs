//! # docshelf CLI
//!
//! ```bash
//! docshelf available python          # browse the catalog
//! docshelf install python~3.12       # download and index a docset
//! docshelf search "list comprehension" --docset python
//! docshelf update all
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docshelf::config;
use docshelf::models::parse_slug;
use docshelf::progress::ProgressMode;
use docshelf::App;

/// Browse and search documentation offline.
#[derive(Parser)]
#[command(name = "docshelf", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Install progress on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and index a docset (e.g. `go`, `python~3.12`).
    Install { slug: String },

    /// Remove an installed docset.
    #[command(alias = "delete")]
    Remove { slug: String },

    /// Re-install a docset, or `all` installed docsets.
    Update { slug: String },

    /// List installed docsets.
    List,

    /// List docsets available in the catalog.
    Available {
        /// Case-insensitive filter on slug or name.
        filter: Option<String>,

        /// Bypass the manifest cache.
        #[arg(long)]
        refresh: bool,
    },

    /// Full-text search across installed docsets.
    Search {
        query: String,

        /// Restrict to one docset name (e.g. `python`).
        #[arg(long)]
        docset: Option<String>,

        /// Restrict to one version of `--docset`.
        #[arg(long)]
        version: Option<String>,

        #[arg(long, default_value_t = 0)]
        limit: i64,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the entries of an installed docset (slug form accepted).
    Entries {
        docset: String,

        #[arg(long)]
        version: Option<String>,

        #[arg(long, default_value_t = 0)]
        limit: i64,
    },

    /// Print one entry.
    Show {
        /// Docset slug, e.g. `rails~7.1`.
        docset: String,
        path: String,

        /// Overrides the version in the slug.
        #[arg(long)]
        version: Option<String>,
    },

    /// Generate shell completions.
    Completions { shell: Shell },
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RUST_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "docshelf", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&config_path)?;
    let app = App::open(&cfg).await?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    let outcome = run(&app, cli.command, progress).await;
    app.close().await;
    outcome
}

async fn run(app: &App, command: Commands, progress: ProgressMode) -> anyhow::Result<()> {
    match command {
        Commands::Install { slug } => {
            let sink = progress.sink();
            let report = app.install_docset(&slug, Some(sink.as_ref())).await?;
            println!("installed {} ({} entries)", report.slug, report.entry_count);
            if report.skipped > 0 {
                println!("  skipped pages: {}", report.skipped);
            }
        }
        Commands::Remove { slug } => {
            app.remove_docset(&slug).await?;
            println!("removed {}", slug);
        }
        Commands::Update { slug } if slug == "all" => {
            let outcomes = app.update_all().await?;
            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(report) => println!("updated {} ({} entries)", outcome.slug, report.entry_count),
                    Err(e) => {
                        failed += 1;
                        eprintln!("Error updating {}: {}", outcome.slug, e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} updates failed", failed, outcomes.len());
            }
            println!("update complete");
        }
        Commands::Update { slug } => {
            let report = app.update_docset(&slug).await?;
            println!("updated {} ({} entries)", report.slug, report.entry_count);
        }
        Commands::List => {
            let docsets = app.list_installed_docsets().await?;
            if docsets.is_empty() {
                println!("No docsets installed. Use `docshelf install <slug>` to install one.");
                return Ok(());
            }
            for ds in docsets {
                println!("  {:<20} {} ({} entries)", ds.slug, ds.display_name, ds.entry_count);
            }
        }
        Commands::Available { filter, refresh } => {
            let entries = app
                .filter_available(filter.as_deref().unwrap_or(""), refresh)
                .await?;
            for entry in &entries {
                let size_mb = entry.db_size as f64 / 1024.0 / 1024.0;
                println!("  {:<25} {:<30} ({:.1} MB)", entry.slug, entry.name, size_mb);
            }
            println!("\n{} docsets found", entries.len());
        }
        Commands::Search {
            query,
            docset,
            version,
            limit,
            json,
        } => {
            let results = app
                .search(
                    &query,
                    docset.as_deref().unwrap_or(""),
                    version.as_deref().unwrap_or(""),
                    limit,
                )
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, r) in results.iter().enumerate() {
                let slug = docshelf::models::format_slug(&r.entry.docset, &r.entry.version);
                println!("{}. [{:.2}] {} / {}", i + 1, r.rank, slug, r.entry.symbol);
                println!("    path: {}", r.entry.path);
                println!("    excerpt: \"{}\"", r.snippet.replace('\n', " ").trim());
                println!();
            }
        }
        Commands::Entries {
            docset,
            version,
            limit,
        } => {
            let (name, slug_version) = parse_slug(&docset);
            let version = version.as_deref().unwrap_or(slug_version);
            for entry in app.list_entries(name, version, limit).await? {
                println!("  {:<40} {}", entry.symbol, entry.path);
            }
        }
        Commands::Show {
            docset,
            path,
            version,
        } => {
            let (name, slug_version) = parse_slug(&docset);
            let version = version.as_deref().unwrap_or(slug_version);
            let entry = app.get_entry(name, version, &path).await?;
            println!("# {}", entry.title);
            println!();
            println!("{}", entry.content);
        }
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

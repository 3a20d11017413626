use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use feedsink::config::{Config, DATABASE_ENV};
use feedsink::extractor::RssExtractor;
use feedsink::feed::HttpFeedParser;
use feedsink::storage::{Database, DatabaseError};
use feedsink::util::{validate_feed_url, HostPolicy};

/// Get the config directory path (~/.config/feedsink/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedsink"))
}

/// Get the data directory path (~/.local/share/feedsink/)
fn get_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("feedsink"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedsink",
    version,
    about = "Ingest RSS/Atom feeds into a local database"
)]
struct Args {
    /// Config file (default: ~/.config/feedsink/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overriding config and FEEDSINK_DATABASE
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Log per-entry progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch feeds and store their new entries, one URL after another
    Extract {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Create the data directory and database schema
    Install,
    /// Print the number of stored rows per entity
    Stats,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if verbose {
        filter = filter.add_directive("feedsink=debug".parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Create `dir` with user-only permissions if it does not exist yet.
/// Existing directories are left as they are.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    tracing::info!(path = %dir.display(), "Created data directory");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set data directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to read data directory metadata"
                );
            }
        }
    }

    Ok(())
}

/// Open the database, creating its directory first if needed.
async fn open_database(path: &Path) -> Result<Database> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_private_dir(dir)?;
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: {} is locked by another feedsink process. Wait for it to finish and try again.",
                path.display()
            );
            std::process::exit(1);
        }
        Err(e) => Err(e).with_context(|| format!("Failed to open database {}", path.display())),
    }
}

async fn run_extract(config: &Config, db: Database, urls: &[String]) -> Result<()> {
    let policy = HostPolicy::from_allow_private(config.allow_private_hosts);
    let parser = HttpFeedParser::new(config).context("Failed to build HTTP client")?;
    let mut extractor = RssExtractor::new(db, parser);

    let mut failed = 0usize;
    for url in urls {
        let url = match validate_feed_url(url, policy) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Rejected feed URL");
                failed += 1;
                continue;
            }
        };

        match extractor.extract(url.as_str()).await {
            Ok(report) => println!(
                "{}: {} new, {} already stored",
                url, report.articles_created, report.articles_skipped
            ),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Extraction failed");
                failed += 1;
            }
        }
    }

    extractor.database().close().await;
    if failed > 0 {
        anyhow::bail!("{} of {} feeds failed", failed, urls.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let env_database = std::env::var(DATABASE_ENV).ok();
    let db_path = config.resolve_database_path(
        args.database.as_deref(),
        env_database.as_deref(),
        &get_data_dir()?,
    );

    match &args.command {
        Command::Install => {
            let db = open_database(&db_path).await?;
            db.close().await;
            tracing::info!(path = %db_path.display(), "Database installed");
            println!("Database ready at {}", db_path.display());
        }
        Command::Stats => {
            let db = open_database(&db_path).await?;
            let counts = db.counts().await.context("Failed to count rows")?;
            db.close().await;
            println!("sources:    {}", counts.sources);
            println!("contents:   {}", counts.contents);
            println!("authors:    {}", counts.authors);
            println!("tags:       {}", counts.tags);
            println!("categories: {}", counts.categories);
        }
        Command::Extract { urls } => {
            let db = open_database(&db_path).await?;
            run_extract(&config, db, urls).await?;
        }
    }

    Ok(())
}

//! Sitescan main entry point
//!
//! This is the command-line interface for the Sitescan site crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sitescan::config::{default_config, load_config_with_hash, Config};
use sitescan::output::{
    build_redirect_report, load_statistics, print_redirect_report, print_statistics,
};
use sitescan::storage::{SqliteStorage, Storage};
use sitescan::{run_crawl, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Sitescan: a single-site crawler for SEO analysis
///
/// Sitescan crawls one website breadth-first from its domain, following
/// internal links, and records pages, links, images, scripts and redirects
/// in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sitescan")]
#[command(version = "1.0.0")]
#[command(about = "A single-site crawler for SEO analysis", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a crawl job for a domain and run it
    Crawl {
        /// Domain or URL to crawl (https:// is assumed without a scheme)
        domain: String,
    },

    /// Run an existing pending job
    Run {
        /// Crawl job ID
        job_id: i64,
    },

    /// Discard a job's crawled data and crawl it again
    Recrawl {
        /// Crawl job ID
        job_id: i64,
    },

    /// Delete a job and all of its data
    Delete {
        /// Crawl job ID
        job_id: i64,
    },

    /// Show statistics for a job
    Status {
        /// Crawl job ID
        job_id: i64,
    },

    /// Show the redirect report for a job
    Redirects {
        /// Crawl job ID
        job_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(cli.config.as_deref())?;
    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;

    match cli.command {
        Command::Crawl { domain } => {
            let job_id = storage.create_job(domain.trim())?;
            println!("Created crawl job {} for {}", job_id, domain.trim());
            handle_crawl(storage, config, job_id).await
        }
        Command::Run { job_id } => handle_crawl(storage, config, job_id).await,
        Command::Recrawl { job_id } => {
            storage.reset_job(job_id)?;
            tracing::info!(job_id, "Cleared previous crawl data");
            handle_crawl(storage, config, job_id).await
        }
        Command::Delete { job_id } => {
            storage.delete_job(job_id)?;
            println!("Deleted crawl job {}", job_id);
            Ok(())
        }
        Command::Status { job_id } => {
            let stats = load_statistics(&storage, job_id)?;
            print_statistics(&stats);
            Ok(())
        }
        Command::Redirects { job_id } => {
            let report =
                build_redirect_report(&storage, job_id, config.crawler.max_redirect_threshold)?;
            print_redirect_report(&report);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitescan=info,warn"),
            1 => EnvFilter::new("sitescan=debug,info"),
            2 => EnvFilter::new("sitescan=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file if one was given, otherwise defaults plus environment
fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Ok(default_config()?)
        }
    }
}

/// Runs a job to completion and prints its statistics
async fn handle_crawl(storage: SqliteStorage, config: Config, job_id: i64) -> anyhow::Result<()> {
    let domain = match storage.get_job(job_id)? {
        Some(job) => job.domain,
        None => bail!("Crawl job {} not found", job_id),
    };

    tracing::info!(
        job_id,
        concurrency = config.crawler.concurrency,
        max_depth = config.crawler.max_depth,
        "Crawling {}",
        domain
    );

    let storage = Arc::new(Mutex::new(storage));
    let status = run_crawl(storage.clone(), config, job_id, &domain).await?;

    let guard = storage
        .lock()
        .map_err(|_| anyhow::anyhow!("Storage lock poisoned"))?;
    let stats = load_statistics(&*guard, job_id)?;
    print_statistics(&stats);

    if status == JobStatus::Failed {
        bail!("Crawl job {} failed", job_id);
    }
    Ok(())
}

//! novelfetch CLI
//!
//! Local entry point for downloads, searches and cache maintenance.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use novelfetch::{
    Engine, JobHooks,
    config::load_config,
    error::Result,
    models::ChapterRange,
};

/// novelfetch - resilient web novel downloader
#[derive(Parser, Debug)]
#[command(
    name = "novelfetch",
    version,
    about = "Download web novel chapters through a retry and bypass ladder"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "novelfetch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a novel by URL or title
    Scrape {
        /// Novel URL, or a title to search for
        input: String,

        /// First chapter (1-based)
        #[arg(long, default_value_t = 1)]
        start: u32,

        /// Last chapter, inclusive (default: all)
        #[arg(long)]
        end: Option<u32>,

        /// Concurrent chapter downloads
        #[arg(long)]
        concurrency: Option<usize>,

        /// User id for resumable progress
        #[arg(long)]
        user: Option<String>,

        /// Write the result as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show novel metadata without downloading chapters
    Metadata { url: String },

    /// Search every supported site
    Search { query: String },

    /// Inspect or prune the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List resumable downloads for a user
    Progress {
        user: String,

        /// Only this novel
        #[arg(long)]
        novel: Option<String>,
    },

    /// Validate the configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Entry counts and sizes per namespace
    Stats,
    /// Drop stale search and metadata records
    ClearExpired,
    /// Remove every cached chapter of one novel
    ClearNovel { url: String },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Hooks that log progress and stop dispatching after Ctrl-C.
fn cli_hooks() -> JobHooks {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing in-flight chapters...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    JobHooks::new()
        .with_progress(|s| {
            if s.done() % 10 == 0 || s.done() == s.total {
                log::info!("Progress: {}/{} ({} failed)", s.done(), s.total, s.failed);
            }
        })
        .with_cancel(move || stop.load(Ordering::SeqCst))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
    };

    let engine = Engine::new(config).await?;
    let outcome = run(&engine, cli.command).await;
    engine.shutdown().await;

    let usage = engine.bandwidth();
    log::debug!(
        "Bandwidth this month ({}): {} of {} bytes",
        usage.month,
        usage.bytes,
        usage.budget_bytes
    );
    outcome
}

async fn run(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Scrape {
            input,
            start,
            end,
            concurrency,
            user,
            output,
        } => {
            let range = ChapterRange::new(start, end);
            let result = engine
                .scrape(&input, range, concurrency, user.as_deref(), &cli_hooks())
                .await?;

            log::info!(
                "'{}': {} chapters, {} failed{}",
                result.title,
                result.chapters.len(),
                result.failed_count,
                if result.cancelled { " (cancelled)" } else { "" }
            );
            match output {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
                    log::info!("Saved to {}", path.display());
                }
                None => print_json(&result)?,
            }
        }

        Command::Metadata { url } => print_json(&engine.get_metadata(&url).await?)?,

        Command::Search { query } => {
            let candidates = engine.search(&query).await?;
            if candidates.is_empty() {
                log::warn!("No results for '{}'", query);
            }
            print_json(&candidates)?;
        }

        Command::Cache { action } => match action {
            CacheAction::Stats => print_json(&engine.cache().stats().await?)?,
            CacheAction::ClearExpired => {
                let removed = engine.cache().clear_expired().await?;
                log::info!("Removed {} expired records", removed);
            }
            CacheAction::ClearNovel { url } => {
                engine.cache().clear_novel_chapters(&url).await?;
            }
        },

        Command::Progress { user, novel } => {
            let records: Vec<_> = match novel {
                Some(url) => engine.progress().get(&user, Some(url.as_str())).await?.into_iter().collect(),
                None => engine.progress().list_for_user(&user).await?,
            };
            if records.is_empty() {
                log::info!("No saved progress for {}", user);
            }
            print_json(&records)?;
        }

        Command::Validate => log::info!("Config OK"),
    }
    Ok(())
}

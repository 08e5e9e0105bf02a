use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use review_crawler_lib::application::{CrawlOrchestrator, OrchestratorConfig, ScraperDriver};
use review_crawler_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use review_crawler_lib::infrastructure::{AppConfig, ChromeLauncher, ConfigManager, ReviewStore};

#[derive(Parser, Debug)]
#[command(name = "review-crawler", version, about = "Scrape product pages and their reviews into SQLite")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Crawl the configured (or given) product URLs. This is the default.
    Run(RunArgs),
    /// Print row counts of the local store
    Stats {
        /// Override the database path
        #[arg(long)]
        db: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Product page to crawl; repeat for several. Replaces the configured targets.
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Show the browser window
    #[arg(long, default_value_t = false)]
    headed: bool,

    /// Override the database path
    #[arg(long)]
    db: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let manager = ConfigManager::new(cli.config.clone());
    let config = match manager.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => match run(config, &manager, args).await {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::from(1),
            Err(e) => {
                error!("Run aborted: {:#}", e);
                eprintln!("Error: {e:#}");
                ExitCode::from(2)
            }
        },
        Commands::Stats { db } => match stats(config, db).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::from(2)
            }
        },
    }
}

/// Returns whether every URL finished successfully
async fn run(mut config: AppConfig, manager: &ConfigManager, args: RunArgs) -> Result<bool> {
    if !args.urls.is_empty() {
        config.scraper.target_urls = args.urls;
    }
    if args.headed {
        config.scraper.headless = false;
    }
    if let Some(db) = args.db {
        config.storage.database_path = db;
    }

    init_logging_with_config(&config.logging)?;
    log_system_info();
    info!("Configuration loaded from: {}", manager.source_description());

    let urls = config.scraper.target_urls.clone();
    if urls.is_empty() {
        warn!("No target URLs configured, nothing to do");
        return Ok(true);
    }

    let store = ReviewStore::open_with(&config.storage)
        .await
        .with_context(|| format!("Failed to open store at {}", config.storage.database_path))?;

    let launcher = Arc::new(ChromeLauncher::new(
        config.scraper.headless,
        config.scraper.task_timeout(),
    ));
    let driver = ScraperDriver::new(&config, launcher).context("Invalid selector configuration")?;
    let orchestrator = CrawlOrchestrator::new(
        driver,
        store.clone(),
        OrchestratorConfig::from_scraper(&config.scraper),
    );

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown requested, cancelling remaining work");
            token.cancel();
        }
    });

    let summary = orchestrator.run(&urls).await;
    store.close().await;
    info!("Store closed");

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?
        );
    }
    Ok(summary.is_success())
}

async fn stats(config: AppConfig, db: Option<String>) -> Result<()> {
    let mut storage = config.storage;
    if let Some(db) = db {
        storage.database_path = db;
    }
    let store = ReviewStore::open_with(&storage)
        .await
        .with_context(|| format!("Failed to open store at {}", storage.database_path))?;

    let counts = store.counts().await?;
    store.close().await;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

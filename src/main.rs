//! clothing-crawler command line
//!
//! - `setup`: write the default config file and create the product store
//! - `scrape --site NAME | --all`: crawl in the foreground and print a summary
//! - `serve`: run the admin API with the background scrape trigger

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use clothing_crawler_lib::api::{self, AppState};
use clothing_crawler_lib::application::ScrapeService;
use clothing_crawler_lib::crawling::CrawlOrchestrator;
use clothing_crawler_lib::domain::SiteName;
use clothing_crawler_lib::infrastructure::{
    AppConfig, ConfigManager, DatabaseConnection, ProductRepository, init_logging_with_config,
    logging::log_system_info,
};

#[derive(Debug, Parser)]
#[command(name = "clothing-crawler", version, about = "Crawl clothing listings into a product store")]
struct Cli {
    /// Config file (JSON or TOML); defaults to the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Force debug level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the default configuration and create the database
    Setup,
    /// Crawl one site or all of them
    Scrape {
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        site: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Run the admin API
    Serve {
        /// Listen address, overrides `server.addr`
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };
    let mut config = match cli.command {
        Command::Setup => manager.initialize_on_first_run().await?,
        _ => manager.load_config().await?,
    };
    if cli.debug {
        config.logging.level = "debug".to_string();
    }

    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    log_system_info();
    info!("📋 Configuration: {}", manager.config_path().display());

    match cli.command {
        Command::Setup => {
            open_store(&config).await?;
            info!("✅ Setup complete, database at {}", config.database.url);
            Ok(())
        }
        Command::Scrape { site, all } => {
            let sites = if all {
                SiteName::ALL.to_vec()
            } else {
                let name = site.unwrap_or_default();
                vec![name.parse::<SiteName>()?]
            };
            run_scrape(&config, &sites).await
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            run_server(&config, &addr).await
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<ProductRepository> {
    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    db.migrate().await.context("Failed to migrate database")?;
    Ok(ProductRepository::new(db.into_pool()))
}

/// Cancel `token` and stop the orchestrator on Ctrl-C
fn spawn_ctrl_c_handler(orchestrator: Arc<CrawlOrchestrator>, token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("🛑 Ctrl-C received, shutting down");
                orchestrator.shutdown();
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

async fn run_scrape(config: &AppConfig, sites: &[SiteName]) -> Result<()> {
    let repository = open_store(config).await?;
    let orchestrator = Arc::new(CrawlOrchestrator::from_config(config, repository)?);
    spawn_ctrl_c_handler(Arc::clone(&orchestrator), CancellationToken::new());

    let results = orchestrator.run_sites(sites).await;
    for (site, result) in sites.iter().zip(results) {
        match result {
            Ok(report) => {
                let totals = report.totals();
                println!(
                    "{site}: {} url(s), {} found, {} inserted, {} duplicates, {} rejected, {} blocked{}",
                    report.urls.len(),
                    totals.found,
                    totals.inserted,
                    totals.skipped_duplicates,
                    totals.rejected,
                    report.count_outcome("aborted-blocked"),
                    report.aborted.as_deref().map(|r| format!(" (aborted: {r})")).unwrap_or_default(),
                );
            }
            Err(e) => println!("{site}: failed to start ({e})"),
        }
    }
    Ok(())
}

async fn run_server(config: &AppConfig, addr: &str) -> Result<()> {
    let repository = open_store(config).await?;
    let orchestrator = Arc::new(CrawlOrchestrator::from_config(config, repository.clone())?);
    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(Arc::clone(&orchestrator), shutdown.clone());

    let state = AppState { repository, scraper: ScrapeService::new(orchestrator) };
    api::serve(addr, state, shutdown).await
}

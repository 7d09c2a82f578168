//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate:
//! 1. Built-in defaults ([`AppConfig::default`], constants in [`defaults`])
//! 2. Optional config file (JSON or TOML)
//! 3. Environment variables, e.g. `CLOTHING_CRAWLER__CRAWLER__MAX_CONCURRENT_JOBS=4`
//!
//! `ConfigManager` owns the on-disk file under the platform config directory.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::SiteName;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "CLOTHING_CRAWLER";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub crawler: CrawlerConfig,
    pub browser: BrowserConfig,
    pub captcha: CaptchaConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Per-site overrides of the adapter defaults
    pub sites: BTreeMap<SiteName, SiteOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection url, e.g. `sqlite:data/products.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Worker pool size: how many site jobs may run at once
    pub max_concurrent_jobs: usize,
    pub navigation_timeout_ms: u64,
    /// Pacing between two navigations to the same host, unless the site overrides it
    pub default_request_delay_ms: u64,
    /// Bound on the first appearance of the product selector
    pub initial_wait_timeout_ms: u64,
    /// Bound on any single in-page script evaluation
    pub evaluate_timeout_ms: u64,
    pub popup_dismiss_rounds: u32,
    pub popup_dismiss_pause_ms: u64,
    /// Case-insensitive substrings that mark a block or CAPTCHA wall
    pub block_signatures: Vec<String>,
    pub blocked_statuses: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserBackend {
    /// Headless Chromium through the DevTools protocol
    Chromium,
    /// Plain HTTP fetch, enough for static listings
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub backend: BrowserBackend,
    pub headless: bool,
    pub launch_args: Vec<String>,
    /// Picked at random once per job
    pub user_agents: Vec<String>,
    pub window_width: u32,
    pub window_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Escalation only happens when a key is present and this is on
    pub enabled: bool,
    pub api_key: Option<String>,
    pub api_url: String,
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
    /// Domain used for injected cookies when the solver does not return one
    pub cookie_domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
    pub auto_cleanup_logs: bool,
    /// Rotated files kept by the cleanup
    pub max_log_files: usize,
}

/// Optional per-site overrides, every field falls back to the adapter default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteOverride {
    pub start_urls: Option<Vec<String>>,
    pub card_selector: Option<String>,
    pub stall_threshold: Option<u32>,
    pub max_attempts: Option<u32>,
    pub scroll_wait_ms: Option<u64>,
    pub request_delay_ms: Option<u64>,
    pub captcha_escalation: Option<bool>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::MAX_CONCURRENT_JOBS,
            navigation_timeout_ms: defaults::NAVIGATION_TIMEOUT_MS,
            default_request_delay_ms: defaults::REQUEST_DELAY_MS,
            initial_wait_timeout_ms: defaults::INITIAL_WAIT_TIMEOUT_MS,
            evaluate_timeout_ms: defaults::EVALUATE_TIMEOUT_MS,
            popup_dismiss_rounds: defaults::POPUP_DISMISS_ROUNDS,
            popup_dismiss_pause_ms: defaults::POPUP_DISMISS_PAUSE_MS,
            block_signatures: defaults::BLOCK_SIGNATURES.iter().map(ToString::to_string).collect(),
            blocked_statuses: defaults::BLOCKED_STATUSES.to_vec(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: BrowserBackend::Chromium,
            headless: true,
            launch_args: defaults::LAUNCH_ARGS.iter().map(ToString::to_string).collect(),
            user_agents: defaults::USER_AGENTS.iter().map(ToString::to_string).collect(),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            api_url: defaults::CAPTCHA_API_URL.to_string(),
            poll_interval_ms: defaults::CAPTCHA_POLL_INTERVAL_MS,
            max_wait_ms: defaults::CAPTCHA_MAX_WAIT_MS,
            cookie_domain: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: defaults::SERVER_ADDR.to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            max_log_files: defaults::LOG_MAX_FILES,
        }
    }
}

impl AppConfig {
    /// Build the layered configuration: defaults, then `path` if given, then env.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default()).context("Failed to serialize defaults")?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.crawler.max_concurrent_jobs == 0 {
            bail!("crawler.max_concurrent_jobs must be greater than 0");
        }
        if self.crawler.navigation_timeout_ms == 0 {
            bail!("crawler.navigation_timeout_ms must be greater than 0");
        }
        if self.database.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        for (site, over) in &self.sites {
            if over.max_attempts == Some(0) {
                bail!("sites.{}.max_attempts must be greater than 0", site);
            }
            if let (Some(threshold), Some(attempts)) = (over.stall_threshold, over.max_attempts) {
                if threshold > attempts {
                    bail!(
                        "sites.{}.stall_threshold ({}) exceeds max_attempts ({})",
                        site, threshold, attempts
                    );
                }
            }
        }
        if self.captcha.enabled && self.captcha.api_key.as_deref().is_none_or(str::is_empty) {
            bail!("captcha.enabled requires captcha.api_key");
        }
        Ok(())
    }

    pub fn site_override(&self, site: SiteName) -> Option<&SiteOverride> {
        self.sites.get(&site)
    }
}

// ===============================
// CONFIG FILE MANAGEMENT
// ===============================

/// Owns the config file on disk
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Platform config directory, e.g. `~/.config/clothing-crawler`
    pub fn get_config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine config directory")?;
        Ok(base.join("clothing-crawler"))
    }

    pub fn new() -> Result<Self> {
        Ok(Self { config_path: Self::get_config_dir()?.join("config.json") })
    }

    pub const fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Write the defaults if no file exists yet and return the effective config
    pub async fn initialize_on_first_run(&self) -> Result<AppConfig> {
        if fs::try_exists(&self.config_path).await.unwrap_or(false) {
            info!("📋 Existing configuration found: {}", self.config_path.display());
            return self.load_config().await;
        }

        info!("🆕 First run, writing default configuration to {}", self.config_path.display());
        let config = AppConfig::default();
        self.save_config(&config).await?;
        Ok(config)
    }

    pub async fn load_config(&self) -> Result<AppConfig> {
        let exists = fs::try_exists(&self.config_path).await.unwrap_or(false);
        AppConfig::load(exists.then_some(self.config_path.as_path()))
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.config_path, json)
            .await
            .with_context(|| format!("Failed to write config file {}", self.config_path.display()))?;
        info!("💾 Configuration saved: {}", self.config_path.display());
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    /// SQLite store location
    pub const DATABASE_URL: &str = "sqlite:data/products.db";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 10;

    /// Jobs for different sites running at once
    pub const MAX_CONCURRENT_JOBS: usize = 2;

    /// Navigation timeout (ms)
    pub const NAVIGATION_TIMEOUT_MS: u64 = 90_000;

    /// Delay between navigations to the same host (ms)
    pub const REQUEST_DELAY_MS: u64 = 5_000;

    /// Wait for the first product card (ms)
    pub const INITIAL_WAIT_TIMEOUT_MS: u64 = 60_000;

    pub const EVALUATE_TIMEOUT_MS: u64 = 30_000;

    /// Settle time after each scroll (ms)
    pub const SCROLL_WAIT_MS: u64 = 3_000;

    /// Non-growing observations before the grid counts as stable
    pub const STALL_THRESHOLD: u32 = 10;

    /// Hard ceiling on scroll/click rounds per page
    pub const MAX_SCROLL_ATTEMPTS: u32 = 60;

    pub const POPUP_DISMISS_ROUNDS: u32 = 3;
    pub const POPUP_DISMISS_PAUSE_MS: u64 = 500;

    pub const BLOCK_SIGNATURES: &[&str] = &[
        "Access Denied",
        "I am not a robot",
        "reCAPTCHA",
        "h-captcha",
        "hcaptcha",
        "captcha-challenge",
        "prove you are human",
        "geo.captcha-delivery.com",
        "DataDome CAPTCHA",
    ];

    pub const BLOCKED_STATUSES: &[u16] = &[403, 429];

    pub const LAUNCH_ARGS: &[&str] = &[
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
    ];

    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/115.0",
    ];

    pub const CAPTCHA_API_URL: &str = "https://api.2captcha.com";
    pub const CAPTCHA_POLL_INTERVAL_MS: u64 = 5_000;
    pub const CAPTCHA_MAX_WAIT_MS: u64 = 180_000;

    pub const SERVER_ADDR: &str = "127.0.0.1:8000";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_NAME: &str = "clothing-crawler.log";
    pub const LOG_AUTO_CLEANUP: bool = true;
    pub const LOG_MAX_FILES: usize = 10;
}

//! Infrastructure layer: configuration, logging, storage and the browser side
//! of the crawl pipeline.

pub mod access_guard;
pub mod browser;
pub mod captcha_solver;
pub mod config;
pub mod database_connection;
pub mod errors;
pub mod host_pacer;
pub mod html_extract;
pub mod logging;
pub mod product_repository;

// Re-export commonly used items
pub use access_guard::{AccessGuard, GuardVerdict};
pub use browser::{BrowserCookie, BrowserDriver, BrowserLauncher, JobBrowser, PageSession};
pub use captcha_solver::{CaptchaChallenge, CaptchaSolver, TwoCaptchaSolver};
pub use config::{AppConfig, ConfigManager, SiteOverride};
pub use database_connection::DatabaseConnection;
pub use errors::{CrawlError, CrawlResult, StoreError, StoreResult};
pub use host_pacer::HostPacer;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use product_repository::{IngestOutcome, ProductRepository};

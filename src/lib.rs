//! Clothing Crawler - Dynamic-page crawl-and-ingest pipeline
//!
//! Drives a headless browser through clothing e-commerce listing pages,
//! waits for lazily loaded product grids to converge, aborts on anti-bot
//! walls, extracts one raw item per product card through a per-site adapter,
//! normalizes it and stores it idempotently keyed by the product link.
//!
//! Layout:
//! - `domain`: products, raw items, sites, crawl job states and reports
//! - `infrastructure`: config, logging, errors, SQLite store, browser sessions,
//!   access guard and CAPTCHA escalation
//! - `crawling`: convergence scroller, normalizer, site adapters, orchestrator
//! - `application`: background scrape trigger shared by CLI and API
//! - `api`: axum admin API

pub mod domain;
pub mod infrastructure;
pub mod crawling;
pub mod application;
pub mod api;

pub use domain::{NewProduct, ProductPatch, ProductRecord, RawItem, SiteName};
pub use infrastructure::{AppConfig, CrawlError, StoreError};

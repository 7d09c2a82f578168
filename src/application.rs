//! Application layer
//!
//! Use cases shared by the CLI and the admin API.

pub mod scrape_service;

pub use scrape_service::{ScrapeAck, ScrapeService};

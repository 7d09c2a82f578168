//! Domain module - Core crawl entities
//!
//! Each submodule is its own file in the domain/ directory; the commonly used
//! types are re-exported here for convenience.

pub mod crawl_job;
pub mod product;
pub mod raw_item;
pub mod site;

pub use crawl_job::{CrawlJob, CrawlReport, IngestTally, PageState, UrlOutcome, UrlReport};
pub use product::{NewProduct, ProductPatch, ProductRecord};
pub use raw_item::RawItem;
pub use site::{SiteName, UnknownSite};

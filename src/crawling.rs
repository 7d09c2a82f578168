//! # Crawl Pipeline
//!
//! URL → rendered DOM → raw items → normalized items → stored rows.
//!
//! - `scroller`: drives a page until its product grid stops growing
//! - `adapter` / `adapters`: per-retailer card extraction behind one trait
//! - `normalizer`: raw strings to typed, comparable product values
//! - `orchestrator`: per-URL state machine and the site worker pool

// 명시적 모듈 선언 (mod.rs 비사용)
pub mod adapter;
pub mod adapters;
pub mod normalizer;
pub mod orchestrator;
pub mod scroller;

pub use adapter::{NavigationStrategy, PageContext, ScrollProfile, SiteAdapter, SiteProfile};
pub use adapters::AdapterRegistry;
pub use normalizer::{Normalizer, Rejection};
pub use orchestrator::{CrawlOrchestrator, OrchestratorConfig};
pub use scroller::{ConvergenceScroller, ScrollOutcome, ScrollReport, ScrollSettings};

//! Background scrape trigger
//!
//! Validates the site name synchronously, then runs the crawl job on a
//! spawned task and hands back an acknowledgement straight away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::crawling::CrawlOrchestrator;
use crate::domain::{CrawlReport, SiteName, UnknownSite};
use crate::infrastructure::errors::CrawlResult;

/// Returned to the caller before any crawling happens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeAck {
    pub request_id: Uuid,
    pub site: SiteName,
    pub accepted_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Clone)]
pub struct ScrapeService {
    orchestrator: Arc<CrawlOrchestrator>,
}

impl ScrapeService {
    pub const fn new(orchestrator: Arc<CrawlOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub const fn orchestrator(&self) -> &Arc<CrawlOrchestrator> {
        &self.orchestrator
    }

    /// Resolve `site_name` to a site with a registered adapter
    pub fn resolve(&self, site_name: &str) -> Result<SiteName, UnknownSite> {
        let site: SiteName = site_name.parse()?;
        if self.orchestrator.registry().get(site).is_none() {
            return Err(UnknownSite(site_name.to_string()));
        }
        Ok(site)
    }

    /// Accept a crawl request. Unknown sites are refused before anything is
    /// spawned. Must be called from within a tokio runtime.
    pub fn trigger(&self, site_name: &str) -> Result<ScrapeAck, UnknownSite> {
        let site = self.resolve(site_name)?;
        let request_id = Uuid::new_v4();
        info!("📥 Scrape request {} accepted for {}", request_id, site);

        // fire and forget, the report ends up in the logs
        drop(self.spawn_job(site, request_id));

        Ok(ScrapeAck {
            request_id,
            site,
            accepted_at: Utc::now(),
            message: format!("Scraping for {site} started in background"),
        })
    }

    /// Run one job on its own task
    pub fn spawn_job(&self, site: SiteName, request_id: Uuid) -> JoinHandle<CrawlResult<CrawlReport>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let result = orchestrator.run_job(site).await;
            match &result {
                Ok(report) => {
                    let totals = report.totals();
                    info!(
                        "🏁 Scrape request {} ({}) done: {} inserted, {} duplicates over {} url(s)",
                        request_id,
                        site,
                        totals.inserted,
                        totals.skipped_duplicates,
                        report.urls.len()
                    );
                }
                Err(e) => error!("❌ Scrape request {} ({}) failed to start: {}", request_id, site, e),
            }
            result
        })
    }
}

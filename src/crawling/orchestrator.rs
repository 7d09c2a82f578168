//! # Crawl Orchestrator
//!
//! Runs crawl jobs. A job is one site: its start URLs are crawled one after
//! the other on a single lazily launched browser, each walking the
//! [`PageState`] machine. Jobs for different sites run concurrently up to
//! `max_concurrent_jobs`.
//!
//! Failure containment:
//! - a rejected card is logged and counted, the page carries on
//! - a blocked, timed out or broken page is recorded, the job carries on
//! - an unavailable store stops the job

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile, extract_cards, extract_json_entries};
use super::adapters::AdapterRegistry;
use super::normalizer::Normalizer;
use super::scroller::{ConvergenceScroller, ScrollOutcome, ScrollSettings};
use crate::domain::{CrawlJob, CrawlReport, IngestTally, PageState, SiteName, UrlOutcome, UrlReport};
use crate::infrastructure::access_guard::{AccessGuard, GuardVerdict};
use crate::infrastructure::browser::{self, BrowserLauncher, JobBrowser, PageSession};
use crate::infrastructure::captcha_solver::TwoCaptchaSolver;
use crate::infrastructure::config::{AppConfig, SiteOverride};
use crate::infrastructure::errors::{CrawlError, CrawlResult};
use crate::infrastructure::host_pacer::HostPacer;
use crate::infrastructure::product_repository::{IngestOutcome, ProductRepository};

/// Orchestrator knobs, resolved from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Worker pool size
    pub max_concurrent_jobs: usize,
    pub navigation_timeout: Duration,
    /// Bound on the first appearance of the card selector
    pub initial_wait_timeout: Duration,
    pub evaluate_timeout: Duration,
    pub popup_dismiss_rounds: u32,
    pub popup_dismiss_pause: Duration,
    pub user_agents: Vec<String>,
    pub site_overrides: BTreeMap<SiteName, SiteOverride>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let crawler = &config.crawler;
        Self {
            max_concurrent_jobs: crawler.max_concurrent_jobs.max(1),
            navigation_timeout: Duration::from_millis(crawler.navigation_timeout_ms),
            initial_wait_timeout: Duration::from_millis(crawler.initial_wait_timeout_ms),
            evaluate_timeout: Duration::from_millis(crawler.evaluate_timeout_ms),
            popup_dismiss_rounds: crawler.popup_dismiss_rounds,
            popup_dismiss_pause: Duration::from_millis(crawler.popup_dismiss_pause_ms),
            user_agents: config.browser.user_agents.clone(),
            site_overrides: config.sites.clone(),
        }
    }
}

/// Tracks one URL through the page state machine
struct PageTracker<'a> {
    url: &'a str,
    state: PageState,
}

impl<'a> PageTracker<'a> {
    const fn new(url: &'a str) -> Self {
        Self { url, state: PageState::Pending }
    }

    fn advance(&mut self, next: PageState) {
        if !self.state.can_transition_to(&next) {
            warn!("Unexpected page transition {} -> {} for {}", self.state, next, self.url);
        }
        debug!("📄 {} {} -> {}", self.url, self.state, next);
        self.state = next;
    }
}

pub struct CrawlOrchestrator {
    config: OrchestratorConfig,
    registry: AdapterRegistry,
    repository: ProductRepository,
    launcher: Arc<dyn BrowserLauncher>,
    guard: AccessGuard,
    pacer: HostPacer,
    /// Worker pool: one permit per running job
    job_slots: Semaphore,
    cancellation_token: CancellationToken,
}

impl CrawlOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: AdapterRegistry,
        repository: ProductRepository,
        launcher: Arc<dyn BrowserLauncher>,
        guard: AccessGuard,
    ) -> Self {
        let job_slots = Semaphore::new(config.max_concurrent_jobs.max(1));
        Self {
            config,
            registry,
            repository,
            launcher,
            guard,
            pacer: HostPacer::new(),
            job_slots,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Wire the built-in adapters, the configured browser back-end and the
    /// CAPTCHA solver when one is enabled
    pub fn from_config(config: &AppConfig, repository: ProductRepository) -> CrawlResult<Self> {
        let orchestrator_config = OrchestratorConfig::from_app_config(config);
        let registry = AdapterRegistry::with_builtin()?;
        let launcher = browser::launcher_from_config(&config.browser, orchestrator_config.navigation_timeout);

        let mut guard = AccessGuard::from_config(&config.crawler);
        if let Some(solver) = TwoCaptchaSolver::from_config(&config.captcha)? {
            info!("🧩 CAPTCHA escalation enabled");
            guard = guard.with_solver(Arc::new(solver), config.captcha.cookie_domain.clone());
        }

        Ok(Self::new(orchestrator_config, registry, repository, launcher, guard))
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub const fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Running jobs finish their current page and stop
    pub fn shutdown(&self) {
        info!("Stopping crawl orchestrator...");
        self.cancellation_token.cancel();
    }

    /// Crawl several sites through the worker pool
    pub async fn run_sites(&self, sites: &[SiteName]) -> Vec<CrawlResult<CrawlReport>> {
        futures::future::join_all(sites.iter().map(|site| self.run_job(*site))).await
    }

    /// Crawl every start URL of `site`, one after the other.
    ///
    /// Page failures are recorded in the report. `Err` is reserved for jobs
    /// that could not start at all.
    pub async fn run_job(&self, site: SiteName) -> CrawlResult<CrawlReport> {
        let adapter = self
            .registry
            .get(site)
            .ok_or_else(|| CrawlError::Configuration(format!("no adapter registered for {site}")))?;
        let profile = self
            .registry
            .profile_for(site, &self.config.site_overrides)
            .ok_or_else(|| CrawlError::Configuration(format!("no profile for {site}")))?;

        let _slot = self
            .job_slots
            .acquire()
            .await
            .map_err(|_| CrawlError::Configuration("worker pool closed".to_string()))?;

        let job = CrawlJob::new(site, profile.start_urls.clone());
        let mut report = CrawlReport::new(&job);
        info!("🕷️ Starting {} crawl job {} ({} start urls)", site, job.id, job.start_urls.len());

        let mut job_browser = JobBrowser::new(
            Arc::clone(&self.launcher),
            browser::pick_user_agent(&self.config.user_agents),
        );

        for url in &job.start_urls {
            if self.cancellation_token.is_cancelled() {
                warn!("🛑 {} job {} cancelled before {}", site, job.id, url);
                report.aborted = Some("cancelled".to_string());
                break;
            }

            let started = Instant::now();
            let mut tracker = PageTracker::new(url);
            let outcome = match self
                .crawl_url(&mut job_browser, adapter.as_ref(), &profile, url, &mut tracker)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_job_fatal() => {
                    error!("❌ Store unavailable, aborting {} job {}: {}", site, job.id, e);
                    report.aborted = Some(e.to_string());
                    report.urls.push(UrlReport {
                        url: url.clone(),
                        outcome: UrlOutcome::AbortedError { reason: e.to_string() },
                        final_state: tracker.state,
                        elapsed_ms: elapsed_ms(started),
                    });
                    break;
                }
                Err(e) => {
                    warn!("⚠️ Abandoning {}: {}", url, e);
                    tracker.advance(PageState::Failed(e.to_string()));
                    UrlOutcome::AbortedError { reason: e.to_string() }
                }
            };

            info!("📄 {} → {} in {}ms", url, outcome.label(), elapsed_ms(started));
            report.urls.push(UrlReport {
                url: url.clone(),
                outcome,
                final_state: tracker.state,
                elapsed_ms: elapsed_ms(started),
            });
        }

        job_browser.release().await;
        report.finished_at = Utc::now();

        let totals = report.totals();
        info!(
            "✅ {} job {} finished: {} found, {} inserted, {} duplicates, {} rejected, {} failed, {} blocked url(s)",
            site,
            job.id,
            totals.found,
            totals.inserted,
            totals.skipped_duplicates,
            totals.rejected,
            totals.failed,
            report.count_outcome("aborted-blocked"),
        );
        Ok(report)
    }

    /// Pending → Loading, then drive the page; the page is closed on every path
    async fn crawl_url(
        &self,
        job_browser: &mut JobBrowser,
        adapter: &dyn SiteAdapter,
        profile: &SiteProfile,
        url: &str,
        tracker: &mut PageTracker<'_>,
    ) -> CrawlResult<UrlOutcome> {
        self.pacer.wait_turn(url, profile.request_delay).await;
        tracker.advance(PageState::Loading);

        let start = PageContext::new(adapter.site(), url)?;
        let mut page = job_browser.open_page().await?;
        let outcome = self.drive_page(page.as_mut(), adapter, profile, &start, tracker).await;
        if let Err(e) = page.close().await {
            debug!("Page close failed for {}: {}", url, e);
        }
        outcome
    }

    async fn drive_page(
        &self,
        page: &mut dyn PageSession,
        adapter: &dyn SiteAdapter,
        profile: &SiteProfile,
        start: &PageContext,
        tracker: &mut PageTracker<'_>,
    ) -> CrawlResult<UrlOutcome> {
        let url = start.page_url.as_str();

        // Loading
        let status = page.navigate(url, self.config.navigation_timeout).await?;
        let current_url = page.current_url().await.unwrap_or_else(|_| url.to_string());
        let text = page.content().await?;

        let mut verdict = self.guard.check_page(status, &current_url, &text);
        if verdict.is_blocked() && profile.captcha_escalation && self.guard.can_escalate() {
            info!("🧩 Escalating blocked page {}", url);
            verdict = self
                .guard
                .escalate(
                    page,
                    url,
                    verdict,
                    self.config.navigation_timeout,
                    &self.pacer,
                    profile.request_delay,
                )
                .await;
        }
        if let GuardVerdict::BlockedAbort { signature } = verdict {
            warn!("🚫 {} blocked ('{}'), abandoning page", url, signature);
            tracker.advance(PageState::Blocked);
            return Ok(UrlOutcome::AbortedBlocked { signature });
        }

        // relative links resolve against where the listing actually landed
        let landed_url = page.current_url().await.unwrap_or(current_url);
        let landed = PageContext::new(start.site, &landed_url).unwrap_or_else(|_| start.clone());
        if landed.page_url != start.page_url {
            debug!("↪️ {} landed on {}", url, landed.page_url);
        }
        let ctx = &landed;

        self.dismiss_popups(page, &profile.dismiss_selectors).await;

        // Stabilizing
        tracker.advance(PageState::Stabilizing);
        if !self.stabilize(page, profile).await? {
            info!("🫙 No products appeared on {}", url);
            tracker.advance(PageState::Done);
            return Ok(UrlOutcome::NoProducts);
        }

        // Extracting: fresh snapshot, handles from before the scroll are stale
        tracker.advance(PageState::Extracting);
        let raw_items = match &profile.strategy {
            NavigationStrategy::PageObjectJson { script } => {
                let value = timeout(self.config.evaluate_timeout, page.evaluate(script))
                    .await
                    .map_err(|_| CrawlError::timeout("page object evaluation", self.config.evaluate_timeout))??;
                extract_json_entries(adapter, &value, ctx)
            }
            _ => {
                let html = page.content().await?;
                extract_cards(adapter, &html, &profile.card_selector, ctx)?
            }
        };

        let mut tally = IngestTally { found: raw_items.len(), ..IngestTally::default() };
        let mut products = Vec::with_capacity(raw_items.len());
        for (index, raw) in raw_items.iter().enumerate() {
            match Normalizer::normalize(raw, ctx, index) {
                Ok(product) => products.push(product),
                Err(rejection) => {
                    warn!("⚠️ Rejected card: {}", rejection);
                    tally.rejected += 1;
                }
            }
        }

        // Ingesting
        tracker.advance(PageState::Ingesting);
        for product in &products {
            match self.repository.ingest(product).await? {
                IngestOutcome::Inserted { id } => {
                    debug!("💾 Stored #{} {}", id, product.product_link);
                    tally.inserted += 1;
                }
                IngestOutcome::SkippedDuplicate => tally.skipped_duplicates += 1,
                IngestOutcome::Failed { reason } => {
                    warn!("⚠️ Store refused {}: {}", product.product_link, reason);
                    tally.failed += 1;
                }
            }
        }
        tracker.advance(PageState::Done);

        if tally.found == 0 {
            return Ok(UrlOutcome::NoProducts);
        }
        Ok(UrlOutcome::Succeeded(tally))
    }

    /// `Ok(false)` when the card selector never appeared
    async fn stabilize(&self, page: &mut dyn PageSession, profile: &SiteProfile) -> CrawlResult<bool> {
        let scroller = ConvergenceScroller::new(ScrollSettings {
            max_attempts: profile.scroll.max_attempts,
            scroll_wait: profile.scroll.scroll_wait,
            stall_threshold: profile.scroll.stall_threshold,
            initial_wait_timeout: self.config.initial_wait_timeout,
        });

        let report = match &profile.strategy {
            NavigationStrategy::StaticHtml | NavigationStrategy::PageObjectJson { .. } => {
                return page
                    .wait_for_selector(&profile.card_selector, self.config.initial_wait_timeout)
                    .await;
            }
            NavigationStrategy::InfiniteScroll => {
                scroller.scroll_until_stable(page, &profile.card_selector).await?
            }
            NavigationStrategy::LoadMoreButton { button_selector } => {
                scroller
                    .click_until_stable(page, &profile.card_selector, button_selector)
                    .await?
            }
        };

        match report.outcome {
            ScrollOutcome::NoGrowth => return Ok(false),
            ScrollOutcome::Stable => {
                debug!("Grid stable at {} cards after {} attempts", report.final_count, report.attempts);
            }
            ScrollOutcome::AttemptsExhausted => {
                info!(
                    "⏹️ Scroll ceiling reached ({} attempts) with {} cards, extracting what loaded",
                    report.attempts, report.final_count
                );
            }
        }
        Ok(true)
    }

    /// Bounded rounds of clicking every dismiss selector; stops at the first
    /// round where nothing was clicked
    async fn dismiss_popups(&self, page: &mut dyn PageSession, selectors: &[String]) {
        if selectors.is_empty() {
            return;
        }
        for round in 0..self.config.popup_dismiss_rounds {
            let mut clicked = false;
            for selector in selectors {
                match page.click(selector).await {
                    Ok(true) => {
                        debug!("🧹 Dismissed popup '{}' (round {})", selector, round + 1);
                        clicked = true;
                    }
                    Ok(false) => {}
                    Err(e) => debug!("Popup click '{}' failed: {}", selector, e),
                }
            }
            if !clicked {
                break;
            }
            if !self.config.popup_dismiss_pause.is_zero() {
                sleep(self.config.popup_dismiss_pause).await;
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

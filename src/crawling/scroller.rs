//! Convergence scroller
//!
//! Repeats advance → settle → count until the number of product cards stops
//! growing for `stall_threshold` consecutive observations. `max_attempts` is a
//! hard ceiling regardless of the stall logic, so a page that lazy-loads
//! forever still terminates.
//!
//! The scroller hands back counts only; callers re-query the DOM afterwards
//! because element handles do not survive the mutations scrolling causes.

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::infrastructure::browser::PageSession;
use crate::infrastructure::config::defaults;
use crate::infrastructure::errors::CrawlResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSettings {
    pub max_attempts: u32,
    pub scroll_wait: Duration,
    /// Consecutive non-growing observations that count as converged
    pub stall_threshold: u32,
    /// Bound on the first appearance of the product selector
    pub initial_wait_timeout: Duration,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_SCROLL_ATTEMPTS,
            scroll_wait: Duration::from_millis(defaults::SCROLL_WAIT_MS),
            stall_threshold: defaults::STALL_THRESHOLD,
            initial_wait_timeout: Duration::from_millis(defaults::INITIAL_WAIT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// The selector never appeared: zero products, not a crash
    NoGrowth,
    /// The count stopped growing
    Stable,
    /// Ceiling reached while the page was still growing
    AttemptsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub outcome: ScrollOutcome,
    /// Count at the last observation
    pub final_count: usize,
    /// Advance rounds performed
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
enum Advance<'a> {
    Scroll,
    ClickLoadMore(&'a str),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceScroller {
    settings: ScrollSettings,
}

impl ConvergenceScroller {
    pub const fn new(settings: ScrollSettings) -> Self {
        Self { settings }
    }

    pub const fn settings(&self) -> &ScrollSettings {
        &self.settings
    }

    /// Scroll to the bottom until the card count converges
    pub async fn scroll_until_stable(
        &self,
        page: &mut dyn PageSession,
        product_selector: &str,
    ) -> CrawlResult<ScrollReport> {
        self.converge(page, product_selector, Advance::Scroll).await
    }

    /// Same loop, advancing by clicking a "load more" button. A missing
    /// button is one more non-growing observation.
    pub async fn click_until_stable(
        &self,
        page: &mut dyn PageSession,
        product_selector: &str,
        button_selector: &str,
    ) -> CrawlResult<ScrollReport> {
        self.converge(page, product_selector, Advance::ClickLoadMore(button_selector))
            .await
    }

    async fn converge(
        &self,
        page: &mut dyn PageSession,
        product_selector: &str,
        advance: Advance<'_>,
    ) -> CrawlResult<ScrollReport> {
        let settings = self.settings;

        if !page
            .wait_for_selector(product_selector, settings.initial_wait_timeout)
            .await?
        {
            debug!("selector '{}' never appeared", product_selector);
            return Ok(ScrollReport { outcome: ScrollOutcome::NoGrowth, final_count: 0, attempts: 0 });
        }

        let threshold = settings.stall_threshold.max(1);
        let mut previous_count = page.count(product_selector).await?;
        let mut last_count = previous_count;
        let mut stall_count = 0_u32;
        let mut attempts = 0_u32;

        while attempts < settings.max_attempts {
            attempts += 1;

            match advance {
                Advance::Scroll => page.scroll_to_bottom().await?,
                Advance::ClickLoadMore(button) => {
                    if !page.click(button).await? {
                        debug!("load-more button '{}' not present", button);
                    }
                }
            }
            if !settings.scroll_wait.is_zero() {
                sleep(settings.scroll_wait).await;
            }

            last_count = page.count(product_selector).await?;
            if last_count > previous_count {
                previous_count = last_count;
                stall_count = 0;
            } else {
                stall_count += 1;
            }
            debug!(
                "🔄 attempt {}/{}: {} cards (stall {}/{})",
                attempts, settings.max_attempts, last_count, stall_count, threshold
            );

            if stall_count >= threshold {
                return Ok(ScrollReport { outcome: ScrollOutcome::Stable, final_count: last_count, attempts });
            }
        }

        Ok(ScrollReport { outcome: ScrollOutcome::AttemptsExhausted, final_count: last_count, attempts })
    }
}

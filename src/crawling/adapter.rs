//! Site adapter contract
//!
//! Every retailer implements [`SiteAdapter`]. The orchestrator only sees the
//! trait: it asks for a [`SiteProfile`] (start URLs, card selector, navigation
//! strategy, pacing) and hands card subtrees, or the evaluated page object, to
//! the adapter's pure extraction functions. Adapters never touch shared crawl
//! state.

use scraper::{ElementRef, Html};
use std::time::Duration;
use url::Url;

use crate::domain::{RawItem, SiteName};
use crate::infrastructure::config::{SiteOverride, defaults};
use crate::infrastructure::errors::{CrawlError, CrawlResult};
use crate::infrastructure::html_extract;

/// How the listing reveals its products
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationStrategy {
    /// Server-rendered, everything is in the first document
    StaticHtml,
    /// Cards are appended while scrolling
    InfiniteScroll,
    /// Cards are appended by clicking a button
    LoadMoreButton { button_selector: String },
    /// Products are read from a JS page object; `script` must evaluate to an array
    PageObjectJson { script: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollProfile {
    pub stall_threshold: u32,
    pub max_attempts: u32,
    pub scroll_wait: Duration,
}

impl Default for ScrollProfile {
    fn default() -> Self {
        Self {
            stall_threshold: defaults::STALL_THRESHOLD,
            max_attempts: defaults::MAX_SCROLL_ATTEMPTS,
            scroll_wait: Duration::from_millis(defaults::SCROLL_WAIT_MS),
        }
    }
}

/// Everything the orchestrator needs to crawl one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub start_urls: Vec<String>,
    /// One product card
    pub card_selector: String,
    pub strategy: NavigationStrategy,
    pub scroll: ScrollProfile,
    /// Pacing between navigations to the same host
    pub request_delay: Duration,
    /// Cookie banners, newsletter modals, localisation prompts
    pub dismiss_selectors: Vec<String>,
    /// Whether a blocked page may be escalated to the CAPTCHA solver
    pub captcha_escalation: bool,
}

impl SiteProfile {
    pub fn new(start_urls: &[&str], card_selector: &str, strategy: NavigationStrategy) -> Self {
        Self {
            start_urls: start_urls.iter().map(ToString::to_string).collect(),
            card_selector: card_selector.to_string(),
            strategy,
            scroll: ScrollProfile::default(),
            request_delay: Duration::from_millis(defaults::REQUEST_DELAY_MS),
            dismiss_selectors: vec![
                "button#onetrust-accept-btn-handler".to_string(),
                r#"button[aria-label="Fermer"]"#.to_string(),
                "button.close-button".to_string(),
            ],
            captcha_escalation: false,
        }
    }

    /// Apply configured overrides on top of the adapter defaults
    #[must_use]
    pub fn with_overrides(mut self, over: &SiteOverride) -> Self {
        if let Some(urls) = &over.start_urls {
            self.start_urls.clone_from(urls);
        }
        if let Some(selector) = &over.card_selector {
            self.card_selector.clone_from(selector);
        }
        if let Some(threshold) = over.stall_threshold {
            self.scroll.stall_threshold = threshold;
        }
        if let Some(attempts) = over.max_attempts {
            self.scroll.max_attempts = attempts;
        }
        if let Some(wait) = over.scroll_wait_ms {
            self.scroll.scroll_wait = Duration::from_millis(wait);
        }
        if let Some(delay) = over.request_delay_ms {
            self.request_delay = Duration::from_millis(delay);
        }
        if let Some(escalate) = over.captcha_escalation {
            self.captcha_escalation = escalate;
        }
        self
    }
}

/// Page level context available to extraction
#[derive(Debug, Clone)]
pub struct PageContext {
    pub site: SiteName,
    pub page_url: String,
    /// Base for resolving relative links and images
    pub base_url: Url,
}

impl PageContext {
    pub fn new(site: SiteName, page_url: &str) -> CrawlResult<Self> {
        let base_url = Url::parse(page_url).map_err(|e| CrawlError::Navigation {
            url: page_url.to_string(),
            reason: format!("invalid url: {e}"),
        })?;
        Ok(Self { site, page_url: page_url.to_string(), base_url })
    }
}

pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> SiteName;

    fn default_profile(&self) -> SiteProfile;

    /// Read one card subtree. Pure: no I/O, no shared state.
    fn extract(&self, card: ElementRef<'_>, ctx: &PageContext) -> RawItem;

    /// Read one entry of the evaluated page object. Only page-object sites
    /// override this.
    fn extract_json(&self, _entry: &serde_json::Value, _ctx: &PageContext) -> RawItem {
        RawItem::default()
    }
}

/// Run `extract` over every card of a DOM snapshot, in document order
pub fn extract_cards(
    adapter: &dyn SiteAdapter,
    html: &str,
    card_selector: &str,
    ctx: &PageContext,
) -> CrawlResult<Vec<RawItem>> {
    let selector = html_extract::compile(card_selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|card| adapter.extract(card, ctx))
        .collect())
}

/// Run `extract_json` over every entry of an evaluated page object
pub fn extract_json_entries(
    adapter: &dyn SiteAdapter,
    value: &serde_json::Value,
    ctx: &PageContext,
) -> Vec<RawItem> {
    match value {
        serde_json::Value::Array(entries) => entries.iter().map(|e| adapter.extract_json(e, ctx)).collect(),
        serde_json::Value::Null => Vec::new(),
        single => vec![adapter.extract_json(single, ctx)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let profile = SiteProfile::new(&["https://shop.example/a"], ".card", NavigationStrategy::InfiniteScroll);
        let over = SiteOverride {
            stall_threshold: Some(4),
            request_delay_ms: Some(0),
            ..Default::default()
        };
        let merged = profile.clone().with_overrides(&over);

        assert_eq!(merged.scroll.stall_threshold, 4);
        assert_eq!(merged.request_delay, Duration::ZERO);
        assert_eq!(merged.scroll.max_attempts, profile.scroll.max_attempts);
        assert_eq!(merged.start_urls, profile.start_urls);
    }

    #[test]
    fn test_page_context_rejects_garbage() {
        assert!(PageContext::new(SiteName::Nike, "not a url").is_err());
        let ctx = PageContext::new(SiteName::Nike, "https://www.nike.com/fr/w").unwrap();
        assert_eq!(ctx.base_url.host_str(), Some("www.nike.com"));
    }
}

//! Browser capability used by the crawl pipeline
//!
//! The pipeline only talks to [`PageSession`]: navigate, wait for a selector,
//! count matches, scroll, click, evaluate a script and snapshot the DOM.
//! Back-ends live in submodules (`chromium` drives a real headless browser,
//! `http` serves static listings over plain HTTP).
//!
//! A [`JobBrowser`] owns the browser for exactly one crawl job: it launches
//! lazily on the first page and is released by the orchestrator on every
//! exit path.

pub mod chromium;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::infrastructure::config::{BrowserBackend, BrowserConfig};
use crate::infrastructure::errors::{CrawlError, CrawlResult};

/// Cookie to inject into a page, e.g. a solved CAPTCHA clearance cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
}

impl BrowserCookie {
    /// Parse a `name=value; name2=value2` header style string
    pub fn parse_header(header: &str, domain: Option<&str>) -> Vec<Self> {
        header
            .split(';')
            .filter_map(|part| {
                let (name, value) = part.split_once('=')?;
                let name = name.trim();
                // attributes, not cookies
                if name.is_empty()
                    || ["path", "domain", "expires", "max-age", "samesite", "secure", "httponly"]
                        .contains(&name.to_ascii_lowercase().as_str())
                {
                    return None;
                }
                Some(Self {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                    domain: domain.map(ToString::to_string),
                    path: Some("/".to_string()),
                })
            })
            .collect()
    }
}

/// One browser tab
#[async_trait]
pub trait PageSession: Send {
    /// Navigate and return the main document HTTP status when the back-end knows it
    async fn navigate(&mut self, url: &str, timeout: Duration) -> CrawlResult<Option<u16>>;

    /// `Ok(false)` when the selector did not show up before `timeout`
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> CrawlResult<bool>;

    async fn count(&mut self, selector: &str) -> CrawlResult<usize>;

    async fn scroll_to_bottom(&mut self) -> CrawlResult<()>;

    /// Click the first match, `Ok(false)` when nothing matched
    async fn click(&mut self, selector: &str) -> CrawlResult<bool>;

    async fn evaluate(&mut self, script: &str) -> CrawlResult<serde_json::Value>;

    /// Serialized DOM of the current document
    async fn content(&mut self) -> CrawlResult<String>;

    async fn current_url(&mut self) -> CrawlResult<String>;

    async fn set_cookies(&mut self, cookies: &[BrowserCookie]) -> CrawlResult<()>;

    fn user_agent(&self) -> &str;

    async fn close(self: Box<Self>) -> CrawlResult<()>;
}

/// A running browser process
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageSession>>;

    /// Tear the process down. Called exactly once by [`JobBrowser::release`].
    async fn shutdown(&mut self) -> CrawlResult<()>;
}

/// Starts browsers; one launch per crawl job
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, user_agent: &str) -> CrawlResult<Box<dyn BrowserDriver>>;

    fn name(&self) -> &'static str;
}

/// Launcher for the configured back-end
pub fn launcher_from_config(config: &BrowserConfig, navigation_timeout: Duration) -> Arc<dyn BrowserLauncher> {
    match config.backend {
        BrowserBackend::Chromium => Arc::new(chromium::ChromiumLauncher::new(config.clone())),
        BrowserBackend::Http => Arc::new(http::HttpLauncher::new(navigation_timeout)),
    }
}

/// Random pick from the configured user agents
pub fn pick_user_agent(user_agents: &[String]) -> String {
    if user_agents.is_empty() {
        return format!("clothing-crawler/{}", env!("CARGO_PKG_VERSION"));
    }
    user_agents[fastrand::usize(..user_agents.len())].clone()
}

// ===============================
// JOB SCOPED BROWSER
// ===============================

/// Browser owned by one crawl job, launched on first use
pub struct JobBrowser {
    launcher: Arc<dyn BrowserLauncher>,
    user_agent: String,
    driver: Option<Box<dyn BrowserDriver>>,
    pages_opened: usize,
}

impl JobBrowser {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, user_agent: String) -> Self {
        Self { launcher, user_agent, driver: None, pages_opened: 0 }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub const fn is_launched(&self) -> bool {
        self.driver.is_some()
    }

    pub const fn pages_opened(&self) -> usize {
        self.pages_opened
    }

    pub async fn open_page(&mut self) -> CrawlResult<Box<dyn PageSession>> {
        if self.driver.is_none() {
            info!("🚀 Launching {} browser", self.launcher.name());
            self.driver = Some(self.launcher.launch(&self.user_agent).await?);
        }
        let Some(driver) = self.driver.as_ref() else {
            return Err(CrawlError::Browser("browser not launched".to_string()));
        };
        let page = driver.new_page().await?;
        self.pages_opened += 1;
        Ok(page)
    }

    /// Shut the browser down if it was ever launched. Safe to call twice.
    pub async fn release(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            match driver.shutdown().await {
                Ok(()) => info!("🧹 {} browser released after {} page(s)", self.launcher.name(), self.pages_opened),
                Err(e) => warn!("⚠️ Browser shutdown failed: {}", e),
            }
        }
    }
}

impl Drop for JobBrowser {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!("JobBrowser dropped without release; relying on driver drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let cookies = BrowserCookie::parse_header("datadome=abc123; Path=/; __ddg1_=x=y", Some(".celio.com"));
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "datadome");
        assert_eq!(cookies[0].value, "abc123");
        assert_eq!(cookies[1].value, "x=y");
        assert_eq!(cookies[1].domain.as_deref(), Some(".celio.com"));
    }

    #[test]
    fn test_pick_user_agent() {
        let agents = vec!["a".to_string(), "b".to_string()];
        let picked = pick_user_agent(&agents);
        assert!(agents.contains(&picked));
        assert!(pick_user_agent(&[]).starts_with("clothing-crawler/"));
    }
}

//! Headless Chromium back-end (DevTools protocol through chromiumoxide)
//!
//! Most page operations are small in-page scripts so every one of them runs
//! under an explicit timeout.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use super::{BrowserCookie, BrowserDriver, BrowserLauncher, PageSession};
use crate::infrastructure::config::BrowserConfig;
use crate::infrastructure::errors::{CrawlError, CrawlResult};

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

// Main document status from the Navigation Timing API (Chrome 109+)
const NAVIGATION_STATUS_JS: &str = r"(() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : null;
})()";

const SCROLL_TO_BOTTOM_JS: &str =
    "window.scrollTo(0, Math.max(document.body.scrollHeight, document.documentElement.scrollHeight)); true";

pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub const fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, user_agent: &str) -> CrawlResult<Box<dyn BrowserDriver>> {
        let mut builder = CdpBrowserConfig::builder()
            .window_size(self.config.window_width, self.config.window_height)
            .arg(format!("--window-size={},{}", self.config.window_width, self.config.window_height))
            .arg(format!("--user-agent={user_agent}"));
        if !self.config.headless {
            builder = builder.with_head();
        }
        for arg in &self.config.launch_args {
            builder = builder.arg(arg.clone());
        }

        let cdp_config = builder
            .build()
            .map_err(|e| CrawlError::Browser(format!("browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| CrawlError::Browser(format!("browser launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Box::new(ChromiumDriver {
            browser,
            handler_task,
            user_agent: user_agent.to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

pub struct ChromiumDriver {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_agent: String,
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageSession>> {
        let page = timeout(SCRIPT_TIMEOUT, self.browser.new_page("about:blank"))
            .await
            .map_err(|_| CrawlError::timeout("open page", SCRIPT_TIMEOUT))?
            .map_err(|e| CrawlError::Browser(format!("failed to open page: {e}")))?;

        Ok(Box::new(ChromiumPage { page, user_agent: self.user_agent.clone() }))
    }

    async fn shutdown(&mut self) -> CrawlResult<()> {
        let closed = timeout(SCRIPT_TIMEOUT, self.browser.close()).await;
        self.handler_task.abort();
        match closed {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CrawlError::Browser(format!("browser close error: {e}"))),
            Err(_) => Err(CrawlError::timeout("browser close", SCRIPT_TIMEOUT)),
        }
    }
}

pub struct ChromiumPage {
    page: Page,
    user_agent: String,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: &str) -> CrawlResult<T> {
        let result = timeout(SCRIPT_TIMEOUT, self.page.evaluate(script))
            .await
            .map_err(|_| CrawlError::timeout("script evaluation", SCRIPT_TIMEOUT))?
            .map_err(|e| CrawlError::Script(e.to_string()))?;
        result.into_value::<T>().map_err(|e| CrawlError::Script(e.to_string()))
    }
}

/// Selector as a JS string literal
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn navigate(&mut self, url: &str, nav_timeout: Duration) -> CrawlResult<Option<u16>> {
        timeout(nav_timeout, self.page.goto(url))
            .await
            .map_err(|_| CrawlError::timeout(format!("navigation to {url}"), nav_timeout))?
            .map_err(|e| CrawlError::Navigation { url: url.to_string(), reason: e.to_string() })?;

        // status is best effort; an unknown status never blocks on its own
        match self.eval::<Option<u16>>(NAVIGATION_STATUS_JS).await {
            Ok(status) => Ok(status),
            Err(e) => {
                debug!("navigation status unavailable for {}: {}", url, e);
                Ok(None)
            }
        }
    }

    async fn wait_for_selector(&mut self, selector: &str, wait: Duration) -> CrawlResult<bool> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        let deadline = Instant::now() + wait;
        loop {
            if self.eval::<bool>(&script).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn count(&mut self, selector: &str) -> CrawlResult<usize> {
        self.eval::<usize>(&format!("document.querySelectorAll({}).length", js_string(selector)))
            .await
    }

    async fn scroll_to_bottom(&mut self) -> CrawlResult<()> {
        self.eval::<bool>(SCROLL_TO_BOTTOM_JS).await.map(|_| ())
    }

    async fn click(&mut self, selector: &str) -> CrawlResult<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            js_string(selector)
        );
        self.eval::<bool>(&script).await
    }

    async fn evaluate(&mut self, script: &str) -> CrawlResult<serde_json::Value> {
        self.eval::<serde_json::Value>(script).await
    }

    async fn content(&mut self) -> CrawlResult<String> {
        timeout(SCRIPT_TIMEOUT, self.page.content())
            .await
            .map_err(|_| CrawlError::timeout("content snapshot", SCRIPT_TIMEOUT))?
            .map_err(|e| CrawlError::Browser(format!("failed to get content: {e}")))
    }

    async fn current_url(&mut self) -> CrawlResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| CrawlError::Browser(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn set_cookies(&mut self, cookies: &[BrowserCookie]) -> CrawlResult<()> {
        let current = self.current_url().await?;
        let params: Vec<CookieParam> = cookies
            .iter()
            .map(|cookie| {
                let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
                param.domain.clone_from(&cookie.domain);
                param.path.clone_from(&cookie.path);
                if cookie.domain.is_none() && !current.is_empty() {
                    param.url = Some(current.clone());
                }
                param
            })
            .collect();

        self.page
            .set_cookies(params)
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to set cookies: {e}")))?;
        Ok(())
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn close(self: Box<Self>) -> CrawlResult<()> {
        if let Err(e) = self.page.close().await {
            warn!("Page close error (tab leak): {}", e);
        }
        Ok(())
    }
}

//! Plain HTTP back-end for server-rendered listings
//!
//! No JavaScript runs: scrolling is a no-op, selector waits are answered from
//! the fetched document right away and script evaluation is unsupported.

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{BrowserCookie, BrowserDriver, BrowserLauncher, PageSession};
use crate::infrastructure::errors::{CrawlError, CrawlResult};
use crate::infrastructure::html_extract;

pub struct HttpLauncher {
    timeout: Duration,
}

impl HttpLauncher {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(&self, user_agent: &str) -> CrawlResult<Box<dyn BrowserDriver>> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR,fr;q=0.9,en;q=0.8"));

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CrawlError::Browser(format!("failed to create HTTP client: {e}")))?;

        Ok(Box::new(HttpDriver { client, jar, user_agent: user_agent.to_string() }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

pub struct HttpDriver {
    client: reqwest::Client,
    jar: Arc<Jar>,
    user_agent: String,
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageSession>> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            jar: Arc::clone(&self.jar),
            user_agent: self.user_agent.clone(),
            url: String::new(),
            html: String::new(),
        }))
    }

    async fn shutdown(&mut self) -> CrawlResult<()> {
        Ok(())
    }
}

pub struct HttpPage {
    client: reqwest::Client,
    jar: Arc<Jar>,
    user_agent: String,
    url: String,
    html: String,
}

#[async_trait]
impl PageSession for HttpPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> CrawlResult<Option<u16>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrawlError::timeout(format!("navigation to {url}"), timeout)
                } else {
                    CrawlError::Navigation { url: url.to_string(), reason: e.to_string() }
                }
            })?;

        let status = response.status().as_u16();
        self.url = response.url().to_string();
        // error bodies are kept: the access guard inspects them
        self.html = response
            .text()
            .await
            .map_err(|e| CrawlError::Navigation { url: url.to_string(), reason: e.to_string() })?;
        Ok(Some(status))
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> CrawlResult<bool> {
        Ok(html_extract::count_matches(&self.html, selector)? > 0)
    }

    async fn count(&mut self, selector: &str) -> CrawlResult<usize> {
        html_extract::count_matches(&self.html, selector)
    }

    async fn scroll_to_bottom(&mut self) -> CrawlResult<()> {
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> CrawlResult<bool> {
        Ok(false)
    }

    async fn evaluate(&mut self, _script: &str) -> CrawlResult<serde_json::Value> {
        Err(CrawlError::Script("script evaluation needs the chromium back-end".to_string()))
    }

    async fn content(&mut self) -> CrawlResult<String> {
        Ok(self.html.clone())
    }

    async fn current_url(&mut self) -> CrawlResult<String> {
        Ok(self.url.clone())
    }

    async fn set_cookies(&mut self, cookies: &[BrowserCookie]) -> CrawlResult<()> {
        let url = Url::parse(&self.url)
            .map_err(|e| CrawlError::Browser(format!("no page loaded to attach cookies to: {e}")))?;
        for cookie in cookies {
            let mut header = format!("{}={}", cookie.name, cookie.value);
            if let Some(domain) = &cookie.domain {
                header.push_str(&format!("; Domain={domain}"));
            }
            if let Some(path) = &cookie.path {
                header.push_str(&format!("; Path={path}"));
            }
            self.jar.add_cookie_str(&header, &url);
        }
        Ok(())
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn close(self: Box<Self>) -> CrawlResult<()> {
        Ok(())
    }
}

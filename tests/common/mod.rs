//! Scripted in-memory browser for pipeline tests
//!
//! A [`FakeLauncher`] serves [`PageScript`]s keyed by URL. Every page call is
//! appended to a shared event log so tests can assert what the pipeline did,
//! and did not do, on a given page.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clothing_crawler_lib::infrastructure::browser::{BrowserCookie, BrowserDriver, BrowserLauncher, PageSession};
use clothing_crawler_lib::infrastructure::{
    CaptchaChallenge, CaptchaSolver, CrawlError, CrawlResult, DatabaseConnection, ProductRepository,
};
use tempfile::{TempDir, tempdir};

/// What one URL looks like to the pipeline
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub status: Option<u16>,
    pub html: String,
    /// Successive `count` answers, the last one repeats
    pub counts: Vec<usize>,
    pub selector_appears: bool,
    pub json: serde_json::Value,
    /// Where the browser ends up after navigating here
    pub redirect_to: Option<String>,
    /// What the same URL serves once clearance cookies were injected
    pub cleared: Option<Box<PageScript>>,
    /// Time spent in `navigate`
    pub load_delay: Duration,
}

impl PageScript {
    pub fn listing(html: &str) -> Self {
        Self { status: Some(200), html: html.to_string(), selector_appears: true, ..Self::default() }
    }

    /// A wall page: no product grid ever shows up
    pub fn blocked(status: u16, html: &str) -> Self {
        Self { status: Some(status), html: html.to_string(), ..Self::default() }
    }

    #[must_use]
    pub fn with_counts(mut self, counts: &[usize]) -> Self {
        self.counts = counts.to_vec();
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: serde_json::Value) -> Self {
        self.json = json;
        self
    }

    #[must_use]
    pub fn redirecting_to(mut self, url: &str) -> Self {
        self.redirect_to = Some(url.to_string());
        self
    }

    #[must_use]
    pub fn cleared_by_cookies(mut self, cleared: PageScript) -> Self {
        self.cleared = Some(Box::new(cleared));
        self
    }

    #[must_use]
    pub fn loading_for(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

/// Shared log of `"<call> <url>"` entries
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls named `call` made while `url` was loaded
    pub fn count(&self, call: &str, url: &str) -> usize {
        let wanted = format!("{call} {url}");
        self.all().iter().filter(|e| **e == wanted).count()
    }
}

pub struct FakePage {
    scripts: Arc<HashMap<String, PageScript>>,
    current: Option<(String, PageScript)>,
    count_calls: usize,
    cookies_set: bool,
    log: EventLog,
}

impl FakePage {
    /// Standalone page already showing `script`
    pub fn showing(url: &str, script: PageScript) -> Self {
        Self {
            scripts: Arc::new(HashMap::new()),
            current: Some((url.to_string(), script)),
            count_calls: 0,
            cookies_set: false,
            log: EventLog::default(),
        }
    }

    /// Fresh page that can navigate to any of `scripts`
    pub fn serving(scripts: Vec<(&str, PageScript)>) -> Self {
        Self {
            scripts: Arc::new(scripts.into_iter().map(|(url, s)| (url.to_string(), s)).collect()),
            current: None,
            count_calls: 0,
            cookies_set: false,
            log: EventLog::default(),
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    fn url(&self) -> String {
        self.current.as_ref().map(|(url, _)| url.clone()).unwrap_or_default()
    }

    fn record(&self, call: &str) {
        self.log.push(format!("{call} {}", self.url()));
    }

    fn script(&self) -> CrawlResult<&PageScript> {
        self.current
            .as_ref()
            .map(|(_, script)| script)
            .ok_or_else(|| CrawlError::Browser("no page loaded".to_string()))
    }
}

#[async_trait]
impl PageSession for FakePage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> CrawlResult<Option<u16>> {
        self.log.push(format!("navigate {url}"));
        let mut script = self.scripts.get(url).cloned().ok_or_else(|| CrawlError::Navigation {
            url: url.to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })?;
        if !script.load_delay.is_zero() {
            tokio::time::sleep(script.load_delay).await;
        }
        if self.cookies_set {
            if let Some(cleared) = script.cleared.take() {
                script = *cleared;
            }
        }
        let status = script.status;
        let landed = script.redirect_to.clone().unwrap_or_else(|| url.to_string());
        self.current = Some((landed, script));
        self.count_calls = 0;
        Ok(status)
    }

    async fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> CrawlResult<bool> {
        self.record("wait");
        Ok(self.script()?.selector_appears)
    }

    async fn count(&mut self, _selector: &str) -> CrawlResult<usize> {
        self.record("count");
        let counts = &self.script()?.counts;
        let value = match counts.len() {
            0 => 0,
            len => counts[self.count_calls.min(len - 1)],
        };
        self.count_calls += 1;
        Ok(value)
    }

    async fn scroll_to_bottom(&mut self) -> CrawlResult<()> {
        self.record("scroll");
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> CrawlResult<bool> {
        self.record("click");
        Ok(false)
    }

    async fn evaluate(&mut self, _script: &str) -> CrawlResult<serde_json::Value> {
        self.record("evaluate");
        Ok(self.script()?.json.clone())
    }

    async fn content(&mut self) -> CrawlResult<String> {
        self.record("content");
        Ok(self.script()?.html.clone())
    }

    async fn current_url(&mut self) -> CrawlResult<String> {
        Ok(self.url())
    }

    async fn set_cookies(&mut self, _cookies: &[BrowserCookie]) -> CrawlResult<()> {
        self.record("set_cookies");
        self.cookies_set = true;
        Ok(())
    }

    fn user_agent(&self) -> &str {
        "test-agent"
    }

    async fn close(self: Box<Self>) -> CrawlResult<()> {
        self.log.push("close".to_string());
        Ok(())
    }
}

struct FakeDriver {
    scripts: Arc<HashMap<String, PageScript>>,
    log: EventLog,
    shutdowns: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageSession>> {
        Ok(Box::new(FakePage {
            scripts: Arc::clone(&self.scripts),
            current: None,
            count_calls: 0,
            cookies_set: false,
            log: self.log.clone(),
        }))
    }

    async fn shutdown(&mut self) -> CrawlResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    scripts: Arc<HashMap<String, PageScript>>,
    pub log: EventLog,
    pub launches: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
    /// Browsers launched and not yet shut down
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(scripts: Vec<(&str, PageScript)>) -> Self {
        Self {
            scripts: Arc::new(scripts.into_iter().map(|(url, s)| (url.to_string(), s)).collect()),
            ..Self::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Most browsers ever alive at the same time
    pub fn peak_browsers(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _user_agent: &str) -> CrawlResult<Box<dyn BrowserDriver>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let alive = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(alive, Ordering::SeqCst);
        Ok(Box::new(FakeDriver {
            scripts: Arc::clone(&self.scripts),
            log: self.log.clone(),
            shutdowns: Arc::clone(&self.shutdowns),
            active: Arc::clone(&self.active),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Solver answering every challenge the same way
#[derive(Clone, Default)]
pub struct FakeSolver {
    pub fails: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FakeSolver {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fails: true, ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaSolver for FakeSolver {
    async fn solve(&self, challenge: &CaptchaChallenge) -> CrawlResult<Vec<BrowserCookie>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(CrawlError::Captcha(format!("unsolvable: {}", challenge.page_url)));
        }
        Ok(vec![BrowserCookie {
            name: "datadome".to_string(),
            value: "cleared".to_string(),
            domain: None,
            path: Some("/".to_string()),
        }])
    }

    fn name(&self) -> &'static str {
        "fake-solver"
    }
}

/// Fresh file backed store; keep the `TempDir` alive for the test
pub async fn temp_store() -> (TempDir, ProductRepository, sqlx::SqlitePool) {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("products.db").display());
    let db = DatabaseConnection::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    let pool = db.into_pool();
    (dir, ProductRepository::new(pool.clone()), pool)
}

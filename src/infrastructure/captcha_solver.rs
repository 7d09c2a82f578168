//! Optional CAPTCHA escalation through a third-party solving service
//!
//! The pipeline never depends on a solve succeeding: a failed or timed out
//! solve simply leaves the page blocked.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::infrastructure::browser::BrowserCookie;
use crate::infrastructure::config::CaptchaConfig;
use crate::infrastructure::errors::{CrawlError, CrawlResult};

static DATADOME_CAPTCHA_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"https://geo\.captcha-delivery\.com/captcha/[^"'\s<>]+"#).ok());

/// What the solver needs to know about the blocked page
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub page_url: String,
    /// Challenge iframe URL when the page exposes one
    pub captcha_url: Option<String>,
    pub user_agent: String,
    pub cookie_domain: Option<String>,
}

impl CaptchaChallenge {
    pub fn from_page(page_url: &str, page_html: &str, user_agent: &str, cookie_domain: Option<String>) -> Self {
        Self {
            page_url: page_url.to_string(),
            captcha_url: find_captcha_url(page_html),
            user_agent: user_agent.to_string(),
            cookie_domain,
        }
    }
}

/// First DataDome challenge URL in the page, HTML entities for `&` undone
pub fn find_captcha_url(html: &str) -> Option<String> {
    DATADOME_CAPTCHA_URL
        .as_ref()?
        .find(html)
        .map(|m| m.as_str().replace("&amp;", "&"))
}

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Clearance cookies to inject before reloading the page
    async fn solve(&self, challenge: &CaptchaChallenge) -> CrawlResult<Vec<BrowserCookie>>;

    fn name(&self) -> &'static str;
}

// ===============================
// 2CAPTCHA
// ===============================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    error_id: i64,
    task_id: Option<u64>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    error_id: i64,
    status: Option<String>,
    solution: Option<TaskSolution>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskSolution {
    cookie: Option<String>,
}

/// DataDome solving through the 2Captcha task API
pub struct TwoCaptchaSolver {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl TwoCaptchaSolver {
    /// `None` unless escalation is enabled and a key is configured
    pub fn from_config(config: &CaptchaConfig) -> CrawlResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        if !config.enabled {
            return Ok(None);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CrawlError::Captcha(format!("failed to create HTTP client: {e}")))?;

        Ok(Some(Self {
            client,
            api_key,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_millis(config.max_wait_ms),
        }))
    }

    async fn create_task(&self, challenge: &CaptchaChallenge) -> CrawlResult<u64> {
        let body = json!({
            "clientKey": self.api_key,
            "task": {
                "type": "DataDomeSliderTask",
                "websiteURL": challenge.page_url,
                "captchaUrl": challenge.captcha_url.as_deref().unwrap_or(&challenge.page_url),
                "userAgent": challenge.user_agent,
            }
        });

        let response: CreateTaskResponse = self
            .client
            .post(format!("{}/createTask", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CrawlError::Captcha(e.to_string()))?
            .json()
            .await
            .map_err(|e| CrawlError::Captcha(e.to_string()))?;

        match (response.error_id, response.task_id) {
            (0, Some(task_id)) => Ok(task_id),
            _ => Err(CrawlError::Captcha(
                response.error_description.unwrap_or_else(|| "createTask rejected".to_string()),
            )),
        }
    }

    async fn poll_result(&self, task_id: u64) -> CrawlResult<String> {
        let deadline = Instant::now() + self.max_wait;
        let body = json!({ "clientKey": self.api_key, "taskId": task_id });

        while Instant::now() < deadline {
            sleep(self.poll_interval).await;

            let response: TaskResultResponse = self
                .client
                .post(format!("{}/getTaskResult", self.api_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| CrawlError::Captcha(e.to_string()))?
                .json()
                .await
                .map_err(|e| CrawlError::Captcha(e.to_string()))?;

            if response.error_id != 0 {
                return Err(CrawlError::Captcha(
                    response.error_description.unwrap_or_else(|| "getTaskResult failed".to_string()),
                ));
            }
            match response.status.as_deref() {
                Some("ready") => {
                    return response
                        .solution
                        .and_then(|s| s.cookie)
                        .ok_or_else(|| CrawlError::Captcha("solution without cookie".to_string()));
                }
                _ => debug!("captcha task {} still processing", task_id),
            }
        }

        Err(CrawlError::timeout("captcha solve", self.max_wait))
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaSolver {
    async fn solve(&self, challenge: &CaptchaChallenge) -> CrawlResult<Vec<BrowserCookie>> {
        info!("🧩 Submitting CAPTCHA for {} to 2captcha", challenge.page_url);
        let task_id = self.create_task(challenge).await?;
        let cookie_header = self.poll_result(task_id).await?;

        let cookies = BrowserCookie::parse_header(&cookie_header, challenge.cookie_domain.as_deref());
        if cookies.is_empty() {
            return Err(CrawlError::Captcha("solver returned no usable cookie".to_string()));
        }
        Ok(cookies)
    }

    fn name(&self) -> &'static str {
        "2captcha"
    }
}

//! Block and CAPTCHA wall detection
//!
//! `check` is a pure signature match on the page status and text. When a
//! solver is configured the guard may escalate a blocked page once: solve,
//! inject the cookies, reload, check again. Any escalation failure keeps the
//! original verdict.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::infrastructure::browser::PageSession;
use crate::infrastructure::captcha_solver::{CaptchaChallenge, CaptchaSolver};
use crate::infrastructure::config::{CrawlerConfig, defaults};
use crate::infrastructure::host_pacer::HostPacer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Continue,
    BlockedAbort { signature: String },
}

impl GuardVerdict {
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::BlockedAbort { .. })
    }
}

#[derive(Clone)]
pub struct AccessGuard {
    /// (as configured, lowercased)
    signatures: Vec<(String, String)>,
    blocked_statuses: Vec<u16>,
    solver: Option<Arc<dyn CaptchaSolver>>,
    cookie_domain: Option<String>,
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::new(
            defaults::BLOCK_SIGNATURES.iter().map(ToString::to_string).collect(),
            defaults::BLOCKED_STATUSES.to_vec(),
        )
    }
}

impl AccessGuard {
    pub fn new(signatures: Vec<String>, blocked_statuses: Vec<u16>) -> Self {
        let signatures = signatures
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                let lower = s.to_lowercase();
                (s, lower)
            })
            .collect();
        Self { signatures, blocked_statuses, solver: None, cookie_domain: None }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.block_signatures.clone(), config.blocked_statuses.clone())
    }

    #[must_use]
    pub fn with_solver(mut self, solver: Arc<dyn CaptchaSolver>, cookie_domain: Option<String>) -> Self {
        self.solver = Some(solver);
        self.cookie_domain = cookie_domain;
        self
    }

    pub fn can_escalate(&self) -> bool {
        self.solver.is_some()
    }

    /// Pure signature match, the status first and then the text
    pub fn check(&self, page_status: Option<u16>, page_text: &str) -> GuardVerdict {
        if let Some(status) = page_status.filter(|s| self.blocked_statuses.contains(s)) {
            return GuardVerdict::BlockedAbort { signature: format!("HTTP {status}") };
        }

        let haystack = page_text.to_lowercase();
        self.signatures
            .iter()
            .find(|(_, lower)| haystack.contains(lower.as_str()))
            .map_or(GuardVerdict::Continue, |(original, _)| GuardVerdict::BlockedAbort {
                signature: original.clone(),
            })
    }

    /// Same as [`check`](Self::check) but the current URL counts as page text
    /// too, challenge pages often redirect to the vendor domain.
    pub fn check_page(&self, page_status: Option<u16>, current_url: &str, page_text: &str) -> GuardVerdict {
        match self.check(None, current_url) {
            GuardVerdict::Continue => self.check(page_status, page_text),
            blocked => blocked,
        }
    }

    /// One solve → inject → reload → re-check round. Never retried.
    ///
    /// The reload is a navigation like any other and waits for its turn on
    /// `pacer` under `request_delay`.
    pub async fn escalate(
        &self,
        page: &mut dyn PageSession,
        url: &str,
        blocked: GuardVerdict,
        navigation_timeout: Duration,
        pacer: &HostPacer,
        request_delay: Duration,
    ) -> GuardVerdict {
        let Some(solver) = &self.solver else {
            return blocked;
        };

        let html = page.content().await.unwrap_or_default();
        let challenge = CaptchaChallenge::from_page(url, &html, page.user_agent(), self.cookie_domain.clone());

        let cookies = match solver.solve(&challenge).await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("❌ {} escalation failed for {}: {}", solver.name(), url, e);
                return blocked;
            }
        };

        info!("🍪 Injecting {} clearance cookie(s) and reloading {}", cookies.len(), url);
        if let Err(e) = page.set_cookies(&cookies).await {
            warn!("❌ Cookie injection failed for {}: {}", url, e);
            return blocked;
        }

        pacer.wait_turn(url, request_delay).await;
        let status = match page.navigate(url, navigation_timeout).await {
            Ok(status) => status,
            Err(e) => {
                warn!("❌ Reload after escalation failed for {}: {}", url, e);
                return blocked;
            }
        };
        let current_url = page.current_url().await.unwrap_or_default();
        match page.content().await {
            Ok(text) => {
                let verdict = self.check_page(status, &current_url, &text);
                if verdict.is_blocked() {
                    warn!("🚫 Still blocked after escalation: {}", url);
                } else {
                    info!("✅ Escalation cleared the wall for {}", url);
                }
                verdict
            }
            Err(e) => {
                warn!("❌ Snapshot after escalation failed for {}: {}", url, e);
                blocked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_blocks() {
        let guard = AccessGuard::default();
        let verdict = guard.check(Some(200), "<h1>Access Denied</h1> You don't have permission");
        assert_eq!(verdict, GuardVerdict::BlockedAbort { signature: "Access Denied".into() });
    }

    #[test]
    fn test_403_blocks_even_with_clean_body() {
        let guard = AccessGuard::default();
        assert!(guard.check(Some(403), "<html>ok</html>").is_blocked());
        assert_eq!(guard.check(Some(200), "<html>ok</html>"), GuardVerdict::Continue);
        assert_eq!(guard.check(None, "<html>ok</html>"), GuardVerdict::Continue);
    }

    #[test]
    fn test_captcha_vendor_markers_case_insensitive() {
        let guard = AccessGuard::default();
        for text in [
            "please complete the RECAPTCHA",
            "<div class=\"h-captcha\">",
            "Prove you are human",
            "<script src=\"https://geo.captcha-delivery.com/captcha/\">",
        ] {
            assert!(guard.check(Some(200), text).is_blocked(), "{text}");
        }
    }

    #[test]
    fn test_url_redirect_to_challenge_blocks() {
        let guard = AccessGuard::default();
        let verdict = guard.check_page(Some(200), "https://geo.captcha-delivery.com/interstitial/", "<html></html>");
        assert!(verdict.is_blocked());
    }

    #[test]
    fn test_custom_signatures_and_statuses() {
        let guard = AccessGuard::new(vec!["Pardon Our Interruption".into(), "  ".into()], vec![451]);
        assert!(guard.check(Some(451), "").is_blocked());
        assert!(guard.check(Some(403), "").eq(&GuardVerdict::Continue));
        assert!(guard.check(None, "pardon our interruption").is_blocked());
        assert!(!guard.can_escalate());
    }
}

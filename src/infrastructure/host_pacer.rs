//! Per-host navigation pacing
//!
//! One `governor` limiter per host with a quota of one cell per delay period:
//! the first navigation to a host goes through immediately, every following
//! one waits until `delay` has elapsed since the previous cell. Callers
//! asking for a different delay on a known host share the same slot; the
//! limiter is rebuilt with its first cell spent, so the switch never lets a
//! navigation through early.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::{InMemoryState, direct::NotKeyed}};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use url::Url;

type HostLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct HostSlot {
    delay: Duration,
    limiter: Arc<HostLimiter>,
}

#[derive(Default)]
pub struct HostPacer {
    slots: Mutex<HashMap<String, HostSlot>>,
}

impl HostPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host part of `url`, the whole string when it does not parse
    pub fn host_of(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string))
            .unwrap_or_else(|| url.to_string())
    }

    /// Wait until a navigation to `url` is allowed under `delay`
    pub async fn wait_turn(&self, url: &str, delay: Duration) {
        let Some(quota) = Quota::with_period(delay) else {
            // zero delay: no pacing
            return;
        };
        let host = Self::host_of(url);
        let limiter = {
            let mut slots = match self.slots.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let slot = slots.entry(host.clone()).or_insert_with(|| HostSlot {
                delay,
                limiter: Arc::new(RateLimiter::direct(quota)),
            });
            if slot.delay != delay {
                debug!("Host {} pacing changed {}ms → {}ms", host, slot.delay.as_millis(), delay.as_millis());
                let limiter = RateLimiter::direct(quota);
                // the host was visited already, start from a spent cell
                let _ = limiter.check();
                *slot = HostSlot { delay, limiter: Arc::new(limiter) };
            }
            Arc::clone(&slot.limiter)
        };

        if limiter.check().is_err() {
            debug!("⏳ Pacing navigation to {} ({}ms)", host, delay.as_millis());
            limiter.until_ready().await;
        }
    }
}

//! Crawl job, per-URL state machine and reports
//!
//! A crawl job is ephemeral: one site plus its start URLs. Every start URL
//! walks the [`PageState`] machine independently and ends with a [`UrlOutcome`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::site::SiteName;

/// One site crawl request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    pub site: SiteName,
    pub start_urls: Vec<String>,
}

impl CrawlJob {
    pub fn new(site: SiteName, start_urls: Vec<String>) -> Self {
        Self { id: Uuid::new_v4(), site, start_urls }
    }
}

// ===============================
// PER-URL STATE MACHINE
// ===============================

/// `Pending → Loading → {Blocked, Stabilizing} → Extracting → Ingesting → Done`
///
/// `Loading`, `Stabilizing` and `Extracting` may fall into `Failed`. A page
/// whose product selector never shows up goes from `Stabilizing` straight to
/// `Done` with no products.
/// `Blocked` and `Failed` are terminal for the URL only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PageState {
    Pending,
    Loading,
    Blocked,
    Stabilizing,
    Extracting,
    Ingesting,
    Done,
    Failed(String),
}

impl PageState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Blocked | Self::Done | Self::Failed(_))
    }

    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Loading)
                | (Self::Loading, Self::Blocked | Self::Stabilizing | Self::Failed(_))
                | (Self::Stabilizing, Self::Extracting | Self::Done | Self::Failed(_))
                | (Self::Extracting, Self::Ingesting | Self::Failed(_))
                | (Self::Ingesting, Self::Done)
        )
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Loading => f.write_str("loading"),
            Self::Blocked => f.write_str("blocked"),
            Self::Stabilizing => f.write_str("stabilizing"),
            Self::Extracting => f.write_str("extracting"),
            Self::Ingesting => f.write_str("ingesting"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

// ===============================
// OUTCOMES & REPORTS
// ===============================

/// Counters for a page that made it through extraction and ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestTally {
    /// Cards matched in the final DOM snapshot
    pub found: usize,
    pub inserted: usize,
    pub skipped_duplicates: usize,
    /// Cards rejected by the normalizer
    pub rejected: usize,
    /// Rows the store refused for a non-connectivity reason
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UrlOutcome {
    Succeeded(IngestTally),
    AbortedBlocked { signature: String },
    AbortedError { reason: String },
    NoProducts,
}

impl UrlOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::AbortedBlocked { .. } => "aborted-blocked",
            Self::AbortedError { .. } => "aborted-error",
            Self::NoProducts => "no-products",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlReport {
    pub url: String,
    pub outcome: UrlOutcome,
    pub final_state: PageState,
    pub elapsed_ms: u64,
}

/// Result of one crawl job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub job_id: Uuid,
    pub site: SiteName,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub urls: Vec<UrlReport>,
    /// Set when the job stopped early because the store became unavailable
    pub aborted: Option<String>,
}

impl CrawlReport {
    pub fn new(job: &CrawlJob) -> Self {
        let now = Utc::now();
        Self {
            job_id: job.id,
            site: job.site,
            started_at: now,
            finished_at: now,
            urls: Vec::with_capacity(job.start_urls.len()),
            aborted: None,
        }
    }

    /// Sum of the per-page tallies
    pub fn totals(&self) -> IngestTally {
        self.urls
            .iter()
            .filter_map(|report| match &report.outcome {
                UrlOutcome::Succeeded(tally) => Some(*tally),
                _ => None,
            })
            .fold(IngestTally::default(), |acc, t| IngestTally {
                found: acc.found + t.found,
                inserted: acc.inserted + t.inserted,
                skipped_duplicates: acc.skipped_duplicates + t.skipped_duplicates,
                rejected: acc.rejected + t.rejected,
                failed: acc.failed + t.failed,
            })
    }

    pub fn count_outcome(&self, label: &str) -> usize {
        self.urls.iter().filter(|r| r.outcome.label() == label).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PageState::Pending,
            PageState::Loading,
            PageState::Stabilizing,
            PageState::Extracting,
            PageState::Ingesting,
            PageState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let failed = PageState::Failed("timeout".into());
        assert!(failed.is_terminal());
        assert!(!failed.can_transition_to(&PageState::Loading));
        assert!(!PageState::Blocked.can_transition_to(&PageState::Stabilizing));
        assert!(!PageState::Ingesting.can_transition_to(&PageState::Failed("x".into())));
    }

    #[test]
    fn test_report_totals() {
        let job = CrawlJob::new(SiteName::Nike, vec!["a".into(), "b".into()]);
        let mut report = CrawlReport::new(&job);
        report.urls.push(UrlReport {
            url: "a".into(),
            outcome: UrlOutcome::Succeeded(IngestTally { found: 3, inserted: 2, skipped_duplicates: 1, ..Default::default() }),
            final_state: PageState::Done,
            elapsed_ms: 10,
        });
        report.urls.push(UrlReport {
            url: "b".into(),
            outcome: UrlOutcome::AbortedBlocked { signature: "access denied".into() },
            final_state: PageState::Blocked,
            elapsed_ms: 5,
        });
        let totals = report.totals();
        assert_eq!(totals.found, 3);
        assert_eq!(totals.inserted, 2);
        assert_eq!(report.count_outcome("aborted-blocked"), 1);
    }
}

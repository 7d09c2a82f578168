//! Error taxonomy for the crawl pipeline and the product store
//!
//! Per-card problems never show up here: they are contained as normalizer
//! rejections. A [`CrawlError`] aborts one page; only
//! [`StoreError::Unavailable`] is allowed to abort a whole job.

use thiserror::Error;

/// Product store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("product_link already stored: {product_link}")]
    Conflict { product_link: String },

    #[error("product {id} not found")]
    NotFound { id: i64 },

    /// Pool closed, connection refused, disk I/O. Fatal for the current job.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("column (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db_err) if is_unavailable_code(db_err.code().as_deref()) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

/// Classified on the primary result code, extended codes carry it in the low byte
/// (`SQLITE_IOERR_WRITE` = 778 is `SQLITE_IOERR` = 10).
///
/// BUSY(5), LOCKED(6), READONLY(8), IOERR(10), CORRUPT(11), FULL(13),
/// CANTOPEN(14), NOTADB(26)
fn is_unavailable_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.trim().parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6 | 8 | 10 | 11 | 13 | 14 | 26))
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Page level crawl failures
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("blocked by anti-bot protection: {signature}")]
    BlockedByAntiBot { signature: String },

    #[error("selector '{selector}' did not appear within {timeout_ms}ms")]
    SelectorTimeout { selector: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("captcha escalation failed: {0}")]
    Captcha(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CrawlError {
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Store connectivity failures abort the job, everything else only the page
    pub const fn is_job_fatal(&self) -> bool {
        matches!(self, Self::Storage(StoreError::Unavailable(_)))
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

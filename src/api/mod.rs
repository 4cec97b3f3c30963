use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::future::Future;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

use crate::models::atspm::{PcdPhase, SplitFailPhase, SplitMonitorPhase};
use crate::models::Config;

pub mod atspm_client;
pub mod clearguide_client;
pub mod pems_client;

pub use atspm_client::AtspmClient;
pub use clearguide_client::ClearGuideClient;
pub use pems_client::PemsClient;

/// Browser-like user agent; the ATSPM site rejects unknown agents
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

/// Request rate limiter shared by a client's calls
pub struct ApiRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Fixed-delay retry loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry_attempts, Duration::from_secs(config.retry_delay_secs))
    }

    /// Run `op` until it succeeds or the attempts are used up. The attempt
    /// number (starting at 1) is passed to `op`.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("⚠️  {} failed: {}. Retrying... (Attempt {}/{})", label, e, attempt, self.attempts);
                    last_error = Some(e);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        let e = last_error.unwrap_or_else(|| anyhow!("no attempts made"));
        error!("❌ {} failed after {} attempts", label, self.attempts);
        Err(e.context(format!("{} failed after {} attempts", label, self.attempts)))
    }
}

/// Append-only text logs for request errors and data warnings
#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    error_path: PathBuf,
    warning_path: PathBuf,
}

impl DiagnosticsLog {
    pub fn new(error_path: impl Into<PathBuf>, warning_path: impl Into<PathBuf>) -> Self {
        Self {
            error_path: error_path.into(),
            warning_path: warning_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.error_log_path, &config.warning_log_path)
    }

    async fn append(path: &PathBuf, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
        let mut buffer = lines.join("\n");
        buffer.push('\n');
        file.write_all(buffer.as_bytes()).await?;
        Ok(())
    }

    pub async fn error(&self, message: &str) {
        error!("{}", message);
        if let Err(e) = Self::append(&self.error_path, &[message.to_string()]).await {
            warn!("Could not write to {}: {}", self.error_path.display(), e);
        }
    }

    pub async fn warnings(&self, messages: &[String]) {
        if let Err(e) = Self::append(&self.warning_path, messages).await {
            warn!("Could not write to {}: {}", self.warning_path.display(), e);
        }
    }
}

/// Headers that make requests look like they came from the ATSPM web page
pub fn browser_headers(origin: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert("Origin", HeaderValue::from_str(origin)?);
    headers.insert("Referer", HeaderValue::from_str(&format!("{}/atspm/", origin))?);
    Ok(headers)
}

/// Source of raw turning movement count pages
#[async_trait::async_trait]
pub trait TmcSource {
    async fn fetch_tmc(&self, intersection_id: &str, date: NaiveDate) -> Result<String>;
}

/// ATSPM report API operations, one location-day at a time.
/// `Ok(None)` means the response body was not valid JSON.
#[async_trait::async_trait]
pub trait ReportApi {
    async fn split_failure(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<SplitFailPhase>>>;
    async fn purdue_coordination(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<PcdPhase>>>;
    async fn split_monitor(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<SplitMonitorPhase>>>;
}

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::{ApiRateLimiter, BROWSER_USER_AGENT};
use crate::models::{Config, DateRange};
use crate::utils::date_windows;

const SERVER_ERROR_RETRIES: u32 = 3;

/// Days of data per export request for a granularity
pub fn window_days(granularity: &str) -> i64 {
    match granularity {
        "sec" => 1,
        "5min" => 7,
        _ => 92,
    }
}

/// `Mon-DD-YYYY_Mon-DD-YYYY_{gran}_{station}.tsv`
pub fn export_file_name(window: DateRange, granularity: &str, station: &str) -> String {
    format!(
        "{}_{}_{}_{}.tsv",
        window.start.format("%b-%d-%Y"),
        window.end.format("%b-%d-%Y"),
        granularity,
        station
    )
}

fn unix_day_bound(date: NaiveDate, end_of_day: bool) -> i64 {
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc().timestamp()).unwrap_or_default()
}

/// Query string for one detector-health text export
pub fn export_params(station: &str, window: DateRange, granularity: &str, q2: &str) -> Vec<(&'static str, String)> {
    vec![
        ("report_form", "1".to_string()),
        ("dnode", "VDS".to_string()),
        ("content", "detector_health".to_string()),
        ("tab", "dh_raw".to_string()),
        ("export", "text".to_string()),
        ("station_id", station.to_string()),
        ("s_time_id", unix_day_bound(window.start, false).to_string()),
        ("s_mm", window.start.month().to_string()),
        ("s_dd", window.start.day().to_string()),
        ("s_yy", window.start.year().to_string()),
        ("s_hh", "0".to_string()),
        ("s_mi", "0".to_string()),
        ("e_time_id", unix_day_bound(window.end, true).to_string()),
        ("e_mm", window.end.month().to_string()),
        ("e_dd", window.end.day().to_string()),
        ("e_yy", window.end.year().to_string()),
        ("e_hh", "23".to_string()),
        ("e_mi", "55".to_string()),
        ("lanes", format!("{}-0", station)),
        ("q", "flow".to_string()),
        ("q2", q2.to_string()),
        ("gn", granularity.to_string()),
    ]
}

/// Downloader for PeMS station exports, authenticated by a browser session cookie
pub struct PemsClient {
    client: Client,
    base_url: String,
    rate_limiter: ApiRateLimiter,
    retry_delay: Duration,
}

impl PemsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let session_id = config
            .pems_session_id
            .as_deref()
            .ok_or_else(|| anyhow!("PEMS_SESSION_ID environment variable required"))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(COOKIE, HeaderValue::from_str(&format!("PHPSESSID={}", session_id))?);

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.pems_base_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Fetch one export window; HTTP 500 is retried
    pub async fn fetch_window(&self, station: &str, window: DateRange, granularity: &str, q2: &str) -> Result<String> {
        let params = export_params(station, window, granularity, q2);

        for attempt in 1..=SERVER_ERROR_RETRIES {
            self.rate_limiter.wait().await;
            let response = self.client.get(format!("{}/", self.base_url)).query(&params).send().await?;
            let status = response.status();

            if status == StatusCode::INTERNAL_SERVER_ERROR {
                warn!(
                    "⚠️  PeMS returned 500 for station {} ({} to {}), attempt {}/{}",
                    station, window.start, window.end, attempt, SERVER_ERROR_RETRIES
                );
                if attempt < SERVER_ERROR_RETRIES {
                    tokio::time::sleep(self.retry_delay).await;
                }
                continue;
            }
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("PeMS request failed with status {}: {}", status, error_text));
            }

            return Ok(response.text().await?);
        }

        Err(anyhow!(
            "PeMS kept failing with server errors for station {} after {} attempts",
            station,
            SERVER_ERROR_RETRIES
        ))
    }

    /// Download every window of `range` for a station into `out_dir`
    pub async fn download_station(
        &self,
        station: &str,
        range: DateRange,
        granularity: &str,
        q2: &str,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir).await?;

        let mut written = Vec::new();
        for window in date_windows(range, window_days(granularity)) {
            let body = self.fetch_window(station, window, granularity, q2).await?;
            let path = out_dir.join(export_file_name(window, granularity, station));
            tokio::fs::write(&path, body).await?;
            info!("💾 Saved {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

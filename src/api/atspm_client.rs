use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::{browser_headers, ApiRateLimiter, DiagnosticsLog, ReportApi, RetryPolicy, TmcSource, BROWSER_USER_AGENT};
use crate::models::atspm::{PcdPhase, SplitFailPhase, SplitMonitorPhase};
use crate::models::Config;

/// Bodies the legacy ATSPM site returns with HTTP 200 when its backend is overloaded
pub const SERVER_ERROR_MESSAGES: [&str; 4] = [
    "Object reference not set to an instance of an object",
    "An error occurred while executing the command definition",
    "The underlying provider failed on Open",
    "Invalid attempt to read when no data is present",
];

pub fn tmc_payload(intersection_id: &str, date: NaiveDate) -> Value {
    let day = date.format("%m/%d/%Y");
    json!({
        "SignalID": intersection_id,
        "StartDate": format!("{} 12:00 AM", day),
        "EndDate": format!("{} 11:59 PM", day),
        "YAxisMax": "1000",
        "Y2AxisMax": "300",
        "MetricTypeID": 5,
        "SelectedBinSize": "60",
        "ShowLaneVolumes": true,
        "ShowTotalVolumes": true,
        "ShowDataTable": true
    })
}

pub fn split_failure_payload(location: &str, date: NaiveDate) -> Value {
    json!({
        "locationIdentifier": location,
        "start": format!("{}T00:00:00", date),
        "end": format!("{}T00:00:00", date + Duration::days(1)),
        "firstSecondsOfRed": "5",
        "showAvgLines": true,
        "showFailLines": true,
        "showPercentFailLines": false
    })
}

pub fn pcd_payload(location: &str, date: NaiveDate) -> Value {
    json!({
        "locationIdentifier": location,
        "start": format!("{}T00:00:00", date),
        "end": format!("{}T23:59:59", date),
        "binSize": "15",
        "showPlanStatistics": true,
        "showVolumes": true,
        "showArrivalsOnGreen": true
    })
}

pub fn split_monitor_payload(location: &str, date: NaiveDate) -> Value {
    json!({
        "locationIdentifier": location,
        "start": format!("{}T00:00:00", date),
        "end": format!("{}T00:00:00", date + Duration::days(1)),
        "percentileSplit": "85"
    })
}

/// Client for the legacy ATSPM chart endpoints and the ATSPM report API
pub struct AtspmClient {
    client: Client,
    legacy_url: String,
    legacy_origin: String,
    report_url: String,
    rate_limiter: ApiRateLimiter,
    retry: RetryPolicy,
    diagnostics: DiagnosticsLog,
}

impl AtspmClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        let legacy_origin = Url::parse(&config.atspm_legacy_url)?.origin().ascii_serialization();

        Ok(Self {
            client,
            legacy_url: config.atspm_legacy_url.trim_end_matches('/').to_string(),
            legacy_origin,
            report_url: config.atspm_report_api_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
            retry: RetryPolicy::from_config(config),
            diagnostics: DiagnosticsLog::from_config(config),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_tmc(&self, intersection_id: &str, date: NaiveDate, attempt: u32) -> Result<String> {
        self.rate_limiter.wait().await;

        let url = format!("{}/DefaultCharts/GetTMCMetric", self.legacy_url);
        let response = self
            .client
            .post(&url)
            .headers(browser_headers(&self.legacy_origin)?)
            .json(&tmc_payload(intersection_id, date))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "Request failed for intersection {} on {} with status code {}",
                intersection_id,
                date.format("%m/%d/%Y"),
                status
            ));
        }

        let content = response.text().await?;
        if let Some(message) = SERVER_ERROR_MESSAGES.iter().find(|m| content.contains(*m)) {
            let error_message = format!(
                "Error message received for intersection {} on {}: {}. Retrying... (Attempt {}/{})",
                intersection_id,
                date.format("%m/%d/%Y"),
                message,
                attempt,
                self.retry.attempts
            );
            self.diagnostics.error(&error_message).await;
            return Err(anyhow!("server error: {}", message));
        }

        Ok(content)
    }

    async fn report<T: DeserializeOwned>(
        &self,
        report: &str,
        payload: Value,
        location: &str,
        date: NaiveDate,
    ) -> Result<Option<T>> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/{}/GetReportData", self.report_url, report);
        debug!("POST {} for {} on {}", url, location, date);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("API request failed with status {}: {}", status, body));
        }

        match serde_json::from_str::<T>(&body) {
            Ok(data) => {
                info!("✅ {} data for location {} on {} received", report, location, date);
                Ok(Some(data))
            }
            Err(e) => {
                let preview: String = body.chars().take(200).collect();
                self.diagnostics
                    .error(&format!(
                        "Error decoding {} JSON for location {} on {}: {}. Response content: {}",
                        report, location, date, e, preview
                    ))
                    .await;
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl TmcSource for AtspmClient {
    async fn fetch_tmc(&self, intersection_id: &str, date: NaiveDate) -> Result<String> {
        let label = format!("TMC request for intersection {} on {}", intersection_id, date);
        self.retry
            .run(&label, |attempt| self.post_tmc(intersection_id, date, attempt))
            .await
    }
}

#[async_trait::async_trait]
impl ReportApi for AtspmClient {
    async fn split_failure(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<SplitFailPhase>>> {
        self.report("SplitFail", split_failure_payload(location, date), location, date)
            .await
    }

    async fn purdue_coordination(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<PcdPhase>>> {
        self.report("PurdueCoordinationDiagram", pcd_payload(location, date), location, date)
            .await
    }

    async fn split_monitor(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<SplitMonitorPhase>>> {
        self.report("SplitMonitor", split_monitor_payload(location, date), location, date)
            .await
    }
}

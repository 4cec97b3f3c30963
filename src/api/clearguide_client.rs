use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ApiRateLimiter;
use crate::models::clearguide::{
    ContourPoint, DataDownloadInfo, DataDownloadRequest, JwtClaims, RefreshedToken, RouteSeriesResponse,
    TimeseriesPoint, TokenPair,
};
use crate::models::Config;

const STILL_GENERATING: &str = "Please check again soon.";

#[derive(Debug, Clone)]
struct Session {
    access: String,
    refresh: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    fn from_pair(pair: TokenPair) -> Self {
        let expires_at = token_expiry(&pair.access);
        Self {
            access: pair.access,
            refresh: pair.refresh,
            expires_at,
        }
    }

    fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp <= Utc::now() + Duration::minutes(5),
            None => false,
        }
    }
}

/// Read the `exp` claim out of a JWT without verifying it
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

/// Query window and options shared by the route endpoints
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub route_id: i64,
    pub s_timestamp: i64,
    pub e_timestamp: i64,
    pub granularity: String,
    pub include_holidays: bool,
}

/// ClearGuide REST client with JWT session handling
pub struct ClearGuideClient {
    client: Client,
    api_url: String,
    auth_url: String,
    customer_key: String,
    username: String,
    password: String,
    session: Arc<Mutex<Option<Session>>>,
    rate_limiter: ApiRateLimiter,
    poll_interval: std::time::Duration,
    max_polls: u32,
}

impl ClearGuideClient {
    pub fn new(config: &Config) -> Result<Self> {
        let (username, password) = config.clearguide_credentials()?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_url: config.clearguide_api_url.trim_end_matches('/').to_string(),
            auth_url: config.clearguide_auth_url.trim_end_matches('/').to_string(),
            customer_key: config.clearguide_customer_key.clone(),
            username,
            password,
            session: Arc::new(Mutex::new(None)),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
            poll_interval: std::time::Duration::from_secs(10),
            max_polls: 720,
        })
    }

    /// Polling cadence for bulk downloads
    pub fn with_polling(mut self, interval: std::time::Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn authenticate(&self) -> Result<Session> {
        let url = format!("{}/api/token/", self.auth_url);
        let response = self
            .client
            .post(&url)
            .form(&[("username", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Error while authenticating... Status Code: {} Message: {}",
                status,
                error_text
            ));
        }

        let pair: TokenPair = response.json().await.context("Token response missing access/refresh")?;
        info!("🔑 Authenticated with ClearGuide as {}", self.username);
        Ok(Session::from_pair(pair))
    }

    /// Exchange the refresh token for a new access token, falling back to a
    /// fresh login when the refresh is rejected
    async fn refresh(&self, session: &Session) -> Result<Session> {
        let url = format!("{}/api/token/refresh/", self.auth_url);
        let response = self
            .client
            .post(&url)
            .form(&[("refresh", session.refresh.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            let refreshed: RefreshedToken = response.json().await?;
            debug!("Refreshed ClearGuide access token");
            return Ok(Session {
                expires_at: token_expiry(&refreshed.access),
                access: refreshed.access,
                refresh: session.refresh.clone(),
            });
        }

        warn!("Token refresh failed with status {}, re-authenticating", response.status());
        self.authenticate().await
    }

    async fn access_token(&self) -> Result<String> {
        let mut guard = self.session.lock().await;
        let session = match guard.take() {
            None => self.authenticate().await?,
            Some(s) if s.needs_refresh() => self.refresh(&s).await?,
            Some(s) => s,
        };
        let token = session.access.clone();
        *guard = Some(session);
        Ok(token)
    }

    async fn force_refresh(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        let session = match guard.take() {
            Some(s) => self.refresh(&s).await?,
            None => self.authenticate().await?,
        };
        *guard = Some(session);
        Ok(())
    }

    /// Authenticated GET; a 401/403 refreshes the token and retries once
    pub async fn call<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut refreshed = false;
        loop {
            let token = self.access_token().await?;
            self.rate_limiter.wait().await;

            debug!("GET {}", url);
            let response = self.client.get(url).query(query).bearer_auth(&token).send().await?;
            let status = response.status();

            if status == StatusCode::OK {
                return Ok(response.json().await?);
            }
            if (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN) && !refreshed {
                warn!("ClearGuide returned {}, refreshing token", status);
                self.force_refresh().await?;
                refreshed = true;
                continue;
            }

            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Error fetching response from ClearGuide... Status Code: {} Message: {}",
                status,
                error_text
            ));
        }
    }

    fn route_params(&self, query: &RouteQuery) -> Vec<(&'static str, String)> {
        vec![
            ("customer_key", self.customer_key.clone()),
            ("route_id", query.route_id.to_string()),
            ("route_id_type", "customer_route_number".to_string()),
            ("s_timestamp", query.s_timestamp.to_string()),
            ("e_timestamp", query.e_timestamp.to_string()),
            ("metrics", "avg_speed".to_string()),
            ("holidays", query.include_holidays.to_string()),
            ("granularity", query.granularity.clone()),
        ]
    }

    async fn route_series<T: DeserializeOwned>(&self, endpoint: &str, query: &RouteQuery) -> Result<Vec<T>> {
        let url = format!("{}{}", self.api_url, endpoint);
        let body: Value = self.call(&url, &self.route_params(query)).await?;
        let response: RouteSeriesResponse<T> = serde_json::from_value(body)?;

        if response.error {
            return Err(anyhow!(
                "ClearGuide reported an error for route {}: {}",
                query.route_id,
                response.msg.unwrap_or_default()
            ));
        }

        response
            .into_metric("avg_speed")
            .ok_or_else(|| anyhow!("Response for route {} has no series.all.avg_speed", query.route_id))
    }

    /// `[unix_ts, avg_speed]` pairs for one route
    pub async fn timeseries(&self, query: &RouteQuery) -> Result<Vec<TimeseriesPoint>> {
        self.route_series("/v1/route/timeseries/", query).await
    }

    /// Distance/speed profiles over time for one route
    pub async fn contours(&self, query: &RouteQuery) -> Result<Vec<ContourPoint>> {
        self.route_series("/v1/route/spatial/contours/", query).await
    }

    /// Submit a bulk download and return its id
    pub async fn create_download(&self, request: &DataDownloadRequest) -> Result<i64> {
        let url = format!("{}/v1/data_downloader/data_downloader/", self.api_url);
        let token = self.access_token().await?;

        self.rate_limiter.wait().await;
        let response = self
            .client
            .post(&url)
            .query(&[("customer_key", self.customer_key.as_str())])
            .bearer_auth(&token)
            .json(request)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Data download creation failed: {}", error_text));
        }
        info!("📦 Data download '{}' created, generation in progress", request.name);

        let downloads: Vec<DataDownloadInfo> = self
            .call(&url, &[("customer_key", self.customer_key.clone())])
            .await
            .context("Data download info fetch failed")?;

        downloads
            .into_iter()
            .find(|d| d.name == request.name)
            .map(|d| d.id)
            .ok_or_else(|| anyhow!("Download '{}' not found in listing", request.name))
    }

    /// Poll until the download is ready and save it as `{name}.csv.gz` in `folder`
    pub async fn download(&self, download_id: i64, name: &str, folder: &Path) -> Result<PathBuf> {
        let url = format!(
            "{}/v1/data_downloader/data_downloader_download/{}/",
            self.api_url, download_id
        );

        for poll in 1..=self.max_polls {
            let token = self.access_token().await?;
            self.rate_limiter.wait().await;

            let response = self
                .client
                .get(&url)
                .query(&[("customer_key", self.customer_key.as_str()), ("jwt", token.as_str())])
                .send()
                .await?;
            let status = response.status();

            if status == StatusCode::OK {
                let bytes = response.bytes().await?;
                tokio::fs::create_dir_all(folder).await?;
                let path = folder.join(format!("{}.csv.gz", name));
                tokio::fs::write(&path, &bytes).await?;
                info!("✅ Download saved to {}", path.display());
                return Ok(path);
            }

            let body = response.text().await.unwrap_or_default();
            let still_generating = status == StatusCode::BAD_REQUEST
                && serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| v.get("msg").and_then(Value::as_str).map(|m| m.contains(STILL_GENERATING)))
                    .unwrap_or(false);

            if !still_generating {
                return Err(anyhow!("Data download file download failed ({}): {}", status, body));
            }

            info!("⏳ Download {} still generating (poll {}/{})", download_id, poll, self.max_polls);
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(anyhow!(
            "Download {} was not ready after {} polls",
            download_id,
            self.max_polls
        ))
    }
}

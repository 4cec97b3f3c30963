//! ClearGuide API request and response types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `/api/token/` response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// `/api/token/refresh/` response
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
}

/// Claims we read out of the access token
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    pub exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesData<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Route response wrapper shared by the timeseries and contour endpoints:
/// `series -> {all|...} -> {metric} -> data`
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSeriesResponse<T> {
    #[serde(default = "HashMap::new")]
    pub series: HashMap<String, HashMap<String, SeriesData<T>>>,
    #[serde(default)]
    pub error: bool,
    pub msg: Option<String>,
}

impl<T> RouteSeriesResponse<T> {
    /// Data points for `series.all.{metric}`
    pub fn into_metric(mut self, metric: &str) -> Option<Vec<T>> {
        self.series
            .remove("all")
            .and_then(|mut metrics| metrics.remove(metric))
            .map(|s| s.data)
    }
}

/// `[unix_ts, value]`
pub type TimeseriesPoint = (f64, Option<f64>);

/// `[unix_ts, [[distance, speed], ...]]`
pub type ContourPoint = (f64, Vec<(f64, Option<f64>)>);

/// Body for creating a bulk data download
#[derive(Debug, Clone, Serialize)]
pub struct DataDownloadRequest {
    pub name: String,
    pub s_timestamp: i64,
    pub e_timestamp: i64,
    pub granularity: String,
    pub time_periods: Vec<String>,
    pub dows: Vec<String>,
    pub geography_codes: Vec<String>,
    pub columns: Vec<String>,
    pub timezone: String,
}

impl DataDownloadRequest {
    /// Statewide 5-minute download for a single day
    pub fn daily(name: &str, day_start: i64, geography: &str, timezone: &str) -> Self {
        Self {
            name: name.to_string(),
            s_timestamp: day_start,
            e_timestamp: day_start,
            granularity: "5min".to_string(),
            time_periods: vec!["00:00-23:59".to_string()],
            dows: ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            geography_codes: vec![geography.to_string()],
            columns: [
                "local_timestamp",
                "network_id",
                "source_id",
                "length",
                "closed",
                "primary_source",
                "source_reference",
                "min_speed",
                "avg_speed",
                "max_speed",
                "freeflow",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            timezone: timezone.to_string(),
        }
    }
}

/// Entry from the data download listing
#[derive(Debug, Clone, Deserialize)]
pub struct DataDownloadInfo {
    pub id: i64,
    pub name: String,
}

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::geo::GeoPoint;

pub mod atspm;
pub mod clearguide;

/// A single GPS fix from a GPX track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub location: GeoPoint,
    pub elevation: Option<f64>,
    pub time: DateTime<Utc>,
}

/// Intersection marker used to split a track into segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub route_id: String,
    pub segment_id: String,
    pub location: GeoPoint,
}

/// One turning movement count reading from the ATSPM TMC table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TmcRecord {
    pub intersection_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub direction: String,
    pub movement: String,
    pub volume: i64,
}

/// Per-lane PeMS detector reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PemsLaneReading {
    #[serde(rename = "StationID")]
    pub station_id: String,
    #[serde(rename = "ReadingDateTime")]
    pub reading_time: chrono::NaiveDateTime,
    #[serde(rename = "Lane")]
    pub lane: u8,
    #[serde(rename = "Volume")]
    pub volume: Option<f64>,
    #[serde(rename = "Speed")]
    pub speed: Option<f64>,
}

/// ClearGuide average speed sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SpeedReading {
    pub route_id: i64,
    pub timestamp: DateTime<Utc>,
    pub avg_speed: Option<f64>,
}

/// ClearGuide spatial contour cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourReading {
    pub route_id: i64,
    pub timestamp: DateTime<Utc>,
    pub distance: f64,
    pub speed: Option<f64>,
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date in the range, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub atspm_legacy_url: String,
    pub atspm_report_api_url: String,
    pub clearguide_api_url: String,
    pub clearguide_auth_url: String,
    pub clearguide_username: Option<String>,
    pub clearguide_password: Option<String>,
    pub clearguide_customer_key: String,
    pub pems_base_url: String,
    pub pems_session_id: Option<String>,
    pub local_timezone: Tz,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub rate_limit_per_minute: u32,
    pub max_concurrent_requests: usize,
    pub error_log_path: String,
    pub warning_log_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "data/avenue.db".to_string(),
            atspm_legacy_url: "https://udottraffic.utah.gov/ATSPM".to_string(),
            atspm_report_api_url: "https://report-api-bdppc3riba-wm.a.run.app".to_string(),
            clearguide_api_url: "https://api.iteris-clearguide.com".to_string(),
            clearguide_auth_url: "https://auth.iteris-clearguide.com".to_string(),
            clearguide_username: None,
            clearguide_password: None,
            clearguide_customer_key: "ut".to_string(),
            pems_base_url: "https://pems.dot.ca.gov".to_string(),
            pems_session_id: None,
            local_timezone: chrono_tz::America::Denver,
            retry_attempts: 6,
            retry_delay_secs: 30,
            rate_limit_per_minute: 120,
            max_concurrent_requests: 10,
            error_log_path: "data/error_messages.txt".to_string(),
            warning_log_path: "data/warning_messages.txt".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();
        let local_timezone = match std::env::var("LOCAL_TIMEZONE") {
            Ok(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("LOCAL_TIMEZONE '{}' is not a known timezone: {}", name, e))?,
            Err(_) => defaults.local_timezone,
        };

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or(defaults.database_path),
            atspm_legacy_url: std::env::var("ATSPM_LEGACY_URL")
                .unwrap_or(defaults.atspm_legacy_url),
            atspm_report_api_url: std::env::var("ATSPM_REPORT_API_URL")
                .unwrap_or(defaults.atspm_report_api_url),
            clearguide_api_url: std::env::var("CLEARGUIDE_API_URL")
                .unwrap_or(defaults.clearguide_api_url),
            clearguide_auth_url: std::env::var("CLEARGUIDE_AUTH_URL")
                .unwrap_or(defaults.clearguide_auth_url),
            clearguide_username: std::env::var("CLEARGUIDE_USERNAME").ok(),
            clearguide_password: std::env::var("CLEARGUIDE_PASSWORD").ok(),
            clearguide_customer_key: std::env::var("CLEARGUIDE_CUSTOMER_KEY")
                .unwrap_or(defaults.clearguide_customer_key),
            pems_base_url: std::env::var("PEMS_BASE_URL")
                .unwrap_or(defaults.pems_base_url),
            pems_session_id: std::env::var("PEMS_SESSION_ID").ok(),
            local_timezone,
            retry_attempts: std::env::var("RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap_or(6),
            retry_delay_secs: std::env::var("RETRY_DELAY_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            error_log_path: std::env::var("ERROR_LOG_PATH")
                .unwrap_or(defaults.error_log_path),
            warning_log_path: std::env::var("WARNING_LOG_PATH")
                .unwrap_or(defaults.warning_log_path),
        })
    }

    /// ClearGuide credentials, required by every ClearGuide tool
    pub fn clearguide_credentials(&self) -> anyhow::Result<(String, String)> {
        match (&self.clearguide_username, &self.clearguide_password) {
            (Some(user), Some(pass)) => Ok((user.clone(), pass.clone())),
            _ => Err(anyhow::anyhow!(
                "CLEARGUIDE_USERNAME and CLEARGUIDE_PASSWORD environment variables required"
            )),
        }
    }
}

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing_subscriber::EnvFilter;

use crate::error::{ToolError, ToolResult};
use crate::models::DateRange;

/// Initialize tracing for a command line tool. `RUST_LOG` wins over the default filter.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second call (tests, chained tools) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Parse a command line date in `YYYYMMDD`, `YYYY-MM-DD` or `MM/DD/YYYY` form
pub fn parse_date(date_str: &str, field_name: &str) -> ToolResult<NaiveDate> {
    let trimmed = date_str.trim();
    let format = if trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        "%Y%m%d"
    } else if trimmed.contains('/') {
        "%m/%d/%Y"
    } else {
        "%Y-%m-%d"
    };

    NaiveDate::parse_from_str(trimmed, format).map_err(|e| ToolError::BadDate {
        value: date_str.to_string(),
        reason: format!("{} ({})", field_name, e),
    })
}

/// Reject ranges that run backwards
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> ToolResult<DateRange> {
    if start > end {
        return Err(ToolError::InvalidDateRange(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    Ok(DateRange::new(start, end))
}

/// Split a range into consecutive windows of at most `window_days` days
pub fn date_windows(range: DateRange, window_days: i64) -> Vec<DateRange> {
    let step = window_days.max(1);
    let mut windows = Vec::new();
    let mut current = range.start;

    while current <= range.end {
        let window_end = std::cmp::min(current + Duration::days(step - 1), range.end);
        windows.push(DateRange::new(current, window_end));
        current += Duration::days(step);
    }

    windows
}

/// Parse an ISO-8601 UTC timestamp with or without fractional seconds and trailing `Z`
pub fn parse_utc_timestamp(value: &str) -> ToolResult<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = trimmed.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .map_err(|_| ToolError::BadTimestamp(value.to_string()))
}

/// Parse a naive local timestamp in any of the layouts the exports use
pub fn parse_local_timestamp(value: &str) -> ToolResult<NaiveDateTime> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %I:%M:%S %p",
    ];

    let trimmed = value.trim();
    // ClearGuide exports carry an offset suffix, which is dropped for local-clock analysis
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(dt.naive_local());
    }

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ToolError::BadTimestamp(value.to_string()))
}

/// Parse a clock time such as `13:05`, `13:05:10`, `1:05 PM` or `1:05:10 PM`
pub fn parse_clock_time(value: &str) -> ToolResult<NaiveTime> {
    const FORMATS: [&str; 4] = ["%H:%M:%S%.f", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];
    let trimmed = value.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ToolError::BadTimestamp(value.to_string()))
}

/// Convert a UTC instant to wall-clock time in the given zone
pub fn to_local(dt: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    dt.with_timezone(&tz).naive_local()
}

fn local_unix(dt: NaiveDateTime, tz: Tz) -> ToolResult<i64> {
    tz.from_local_datetime(&dt)
        .earliest()
        .map(|t| t.timestamp())
        .ok_or_else(|| ToolError::BadTimestamp(dt.to_string()))
}

/// Unix seconds for local midnight on the first day and 23:59:59 on the last
pub fn local_day_bounds(range: DateRange, tz: Tz) -> ToolResult<(i64, i64)> {
    let start = range
        .start
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ToolError::BadTimestamp(range.start.to_string()))?;
    let end = range
        .end
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| ToolError::BadTimestamp(range.end.to_string()))?;
    Ok((local_unix(start, tz)?, local_unix(end, tz)?))
}

/// Sample standard deviation (n - 1). `None` with fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::clearguide_client::RouteQuery;
use crate::api::{ClearGuideClient, DiagnosticsLog, ReportApi};
use crate::database::DatabaseManager;
use crate::error::ToolError;
use crate::models::{DateRange, SpeedReading};

/// ATSPM report API endpoints that can be collected into the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtspmReport {
    SplitFailure,
    PurdueCoordination,
    SplitMonitor,
}

impl AtspmReport {
    pub fn label(&self) -> &'static str {
        match self {
            AtspmReport::SplitFailure => "split failure",
            AtspmReport::PurdueCoordination => "purdue coordination",
            AtspmReport::SplitMonitor => "split monitor",
        }
    }
}

/// Counters for one collection run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollectSummary {
    pub requests: usize,
    pub phases_stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Read the `Signal_ID` column of a signal list CSV
pub fn read_signal_ids(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    let idx = headers
        .iter()
        .position(|h| h == "Signal_ID")
        .ok_or_else(|| ToolError::missing_column("Signal_ID", &path.display().to_string()))?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(id) = record.get(idx).filter(|v| !v.is_empty()) {
            ids.push(id.to_string());
        }
    }

    if ids.is_empty() {
        return Err(ToolError::Empty(format!("no signal ids in {}", path.display())).into());
    }
    Ok(ids)
}

/// Pulls ATSPM report data location by location, day by day, into SQLite
pub struct DataCollector {
    api: Arc<dyn ReportApi + Send + Sync>,
    database: Arc<DatabaseManager>,
    diagnostics: Arc<DiagnosticsLog>,
}

impl DataCollector {
    pub fn new(
        api: Arc<dyn ReportApi + Send + Sync>,
        database: Arc<DatabaseManager>,
        diagnostics: Arc<DiagnosticsLog>,
    ) -> Self {
        Self {
            api,
            database,
            diagnostics,
        }
    }

    /// Fetch and store one location-day. `Ok(None)` means the response was
    /// unusable and nothing was stored.
    async fn collect_day(&self, report: AtspmReport, location: &str, date: NaiveDate) -> Result<Option<usize>> {
        match report {
            AtspmReport::SplitFailure => {
                let Some(phases) = self.api.split_failure(location, date).await? else {
                    return Ok(None);
                };
                for phase in &phases {
                    self.database.save_split_fail_phase(date, phase).await?;
                }
                Ok(Some(phases.len()))
            }
            AtspmReport::PurdueCoordination => {
                let Some(phases) = self.api.purdue_coordination(location, date).await? else {
                    return Ok(None);
                };
                for phase in &phases {
                    self.database.save_pcd_phase(location, date, phase).await?;
                }
                Ok(Some(phases.len()))
            }
            AtspmReport::SplitMonitor => {
                let Some(phases) = self.api.split_monitor(location, date).await? else {
                    return Ok(None);
                };
                for phase in &phases {
                    self.database.save_split_monitor_phase(date, phase).await?;
                }
                Ok(Some(phases.len()))
            }
        }
    }

    /// Collect a report for every location × day of `range`
    pub async fn collect_report(
        &self,
        report: AtspmReport,
        locations: &[String],
        range: DateRange,
    ) -> Result<CollectSummary> {
        info!(
            "📊 Collecting {} data for {} locations over {} days",
            report.label(),
            locations.len(),
            range.days_count()
        );

        let mut summary = CollectSummary::default();
        for location in locations {
            for date in range.days() {
                summary.requests += 1;
                match self.collect_day(report, location, date).await {
                    Ok(Some(phases)) => summary.phases_stored += phases,
                    Ok(None) => summary.skipped += 1,
                    Err(e) => {
                        summary.failed += 1;
                        self.diagnostics
                            .error(&format!(
                                "Request failed for location {} on {}: {:#}",
                                location, date, e
                            ))
                            .await;
                    }
                }
            }
        }

        info!(
            "✅ {} collection finished: {} phases stored, {} skipped, {} failed",
            report.label(),
            summary.phases_stored,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }
}

/// Store ClearGuide average speeds for each route over `[s_timestamp, e_timestamp]`
pub async fn collect_route_speeds(
    client: &ClearGuideClient,
    database: &DatabaseManager,
    route_ids: &[i64],
    s_timestamp: i64,
    e_timestamp: i64,
    granularity: &str,
    include_holidays: bool,
) -> Result<usize> {
    let mut total = 0;
    for &route_id in route_ids {
        let query = RouteQuery {
            route_id,
            s_timestamp,
            e_timestamp,
            granularity: granularity.to_string(),
            include_holidays,
        };
        let points = client.timeseries(&query).await?;

        let mut readings = Vec::with_capacity(points.len());
        for (ts, avg_speed) in points {
            let timestamp = DateTime::from_timestamp(ts as i64, 0)
                .ok_or_else(|| anyhow!("route {} returned an invalid timestamp {}", route_id, ts))?;
            readings.push(SpeedReading {
                route_id,
                timestamp,
                avg_speed,
            });
        }

        if readings.is_empty() {
            warn!("Route {} returned no data", route_id);
            continue;
        }
        let stored = database.insert_speed_readings(&readings).await?;
        info!("✅ Route {}: {} speed samples stored", route_id, stored);
        total += stored;
    }
    Ok(total)
}

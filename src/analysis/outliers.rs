//! Before/after travel-time comparison over ClearGuide route exports

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::ToolError;
use crate::report::{fmt_cell, Sheet, Workbook};
use crate::utils::{mean, parse_local_timestamp, sample_std};

pub const OUTLIER_Z_THRESHOLD: f64 = 3.0;

pub const RAW_DATA_SHEET: &str = "Raw Data";
pub const SUMMARY_SHEET: &str = "Summary Table";
pub const OUTLIERS_SHEET: &str = "Outliers";

#[derive(Debug, Deserialize)]
struct ExportRow {
    local_datetime: String,
    avg_travel_time: Option<f64>,
}

/// One ClearGuide travel time observation
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeSample {
    pub source_file: String,
    pub local_datetime: NaiveDateTime,
    pub avg_travel_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSample {
    pub source_file: String,
    pub local_datetime: NaiveDateTime,
    pub avg_travel_time: f64,
    pub before_after: &'static str,
    pub hour: u32,
    pub hourly_average: f64,
    pub z_score: Option<f64>,
}

impl ScoredSample {
    pub fn is_outlier(&self) -> bool {
        self.z_score.is_some_and(|z| z.abs() > OUTLIER_Z_THRESHOLD)
    }
}

/// Read every `.csv` export in `folder`; rows without a travel time are skipped
pub fn read_export_folder(folder: &Path) -> Result<Vec<TravelTimeSample>> {
    let mut paths: Vec<_> = fs::read_dir(folder)
        .with_context(|| format!("Failed to read folder {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(ToolError::Empty(format!("no CSV files in {}", folder.display())).into());
    }

    let mut samples = Vec::new();
    for path in &paths {
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut reader = csv::Reader::from_path(path)?;
        let mut skipped = 0usize;
        for row in reader.deserialize::<ExportRow>() {
            let row = row.with_context(|| format!("Bad row in {}", source_file))?;
            let Some(avg_travel_time) = row.avg_travel_time else {
                skipped += 1;
                continue;
            };
            samples.push(TravelTimeSample {
                source_file: source_file.clone(),
                local_datetime: parse_local_timestamp(&row.local_datetime)?,
                avg_travel_time,
            });
        }
        if skipped > 0 {
            warn!("⚠️  {} rows without avg_travel_time in {}", skipped, source_file);
        }
    }

    info!("📂 Loaded {} travel times from {} files", samples.len(), paths.len());
    Ok(samples)
}

/// Tag before/after, compute hourly averages and z-scores
pub fn score_samples(samples: &[TravelTimeSample], implementation_date: NaiveDate) -> Vec<ScoredSample> {
    let cutoff = implementation_date.and_time(NaiveTime::MIN);
    let side = |t: NaiveDateTime| if t < cutoff { "before" } else { "after" };

    let mut groups: HashMap<(&'static str, &str, u32), Vec<f64>> = HashMap::new();
    for s in samples {
        groups
            .entry((side(s.local_datetime), s.source_file.as_str(), s.local_datetime.hour()))
            .or_default()
            .push(s.avg_travel_time);
    }
    let hourly: HashMap<_, f64> = groups
        .into_iter()
        .filter_map(|(k, v)| mean(&v).map(|m| (k, m)))
        .collect();

    let mut scored: Vec<ScoredSample> = samples
        .iter()
        .map(|s| {
            let before_after = side(s.local_datetime);
            let hour = s.local_datetime.hour();
            ScoredSample {
                source_file: s.source_file.clone(),
                local_datetime: s.local_datetime,
                avg_travel_time: s.avg_travel_time,
                before_after,
                hour,
                hourly_average: hourly
                    .get(&(before_after, s.source_file.as_str(), hour))
                    .copied()
                    .unwrap_or(s.avg_travel_time),
                z_score: None,
            }
        })
        .collect();

    // spread of the hourly averages column, one value per row
    let column: Vec<f64> = scored.iter().map(|s| s.hourly_average).collect();
    let spread = sample_std(&column).filter(|s| *s > 0.0);
    for s in scored.iter_mut() {
        s.z_score = spread.map(|std| (s.avg_travel_time - s.hourly_average) / std);
    }
    scored
}

/// Rows inside the peak window whose z-score is below the threshold
pub fn peak_filter(scored: &[ScoredSample], start: NaiveTime, stop: NaiveTime) -> Vec<&ScoredSample> {
    scored
        .iter()
        .filter(|s| {
            let t = s.local_datetime.time();
            t >= start && t <= stop
        })
        .filter(|s| s.z_score.is_some_and(|z| z < OUTLIER_Z_THRESHOLD))
        .collect()
}

/// Mean travel time per route and side, ordered by route
pub fn summary_table(filtered: &[&ScoredSample]) -> Sheet {
    let mut sums: BTreeMap<&str, BTreeMap<&str, Vec<f64>>> = BTreeMap::new();
    let mut sides: BTreeSet<&str> = BTreeSet::new();
    for s in filtered {
        sides.insert(s.before_after);
        sums.entry(s.source_file.as_str())
            .or_default()
            .entry(s.before_after)
            .or_default()
            .push(s.avg_travel_time);
    }

    let columns: Vec<&str> = ["before", "after"].into_iter().filter(|c| sides.contains(c)).collect();
    let mut headers = vec!["source_file".to_string()];
    headers.extend(columns.iter().map(|c| c.to_string()));

    let mut sheet = Sheet::new(SUMMARY_SHEET, headers);
    for (source_file, by_side) in sums {
        let mut row = vec![source_file.to_string()];
        row.extend(columns.iter().map(|c| fmt_cell(by_side.get(c).and_then(|v| mean(v)))));
        sheet.push_row(row);
    }
    sheet
}

/// Full tool run: raw data, summary table and outliers
pub fn build_outlier_workbook(
    samples: &[TravelTimeSample],
    implementation_date: NaiveDate,
    peak_start: NaiveTime,
    peak_stop: NaiveTime,
) -> Result<Workbook> {
    let scored = score_samples(samples, implementation_date);
    let filtered = peak_filter(&scored, peak_start, peak_stop);
    let outliers: Vec<ScoredSample> = scored.iter().filter(|s| s.is_outlier()).cloned().collect();

    info!(
        "📊 {} rows scored, {} in peak window, {} outliers",
        scored.len(),
        filtered.len(),
        outliers.len()
    );

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records(RAW_DATA_SHEET, &scored)?)
        .add_sheet(summary_table(&filtered))
        .add_sheet(Sheet::from_records(OUTLIERS_SHEET, &outliers)?);
    Ok(workbook)
}

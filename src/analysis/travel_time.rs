//! GPX travel-time reconstruction
//!
//! A track is walked point by point. Whenever a point falls within the match
//! radius of an intersection, the time since the previously matched
//! intersection becomes one segment travel time. Segments from many runs are
//! then labelled, numbered and pivoted into 15-minute time-of-day bins.

use chrono::{Duration, NaiveDateTime, Timelike};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::geo::haversine_m;
use crate::models::{Intersection, TrackPoint};
use crate::report::{fmt_cell, Sheet, Workbook};
use crate::utils::{mean, sample_std, to_local};

/// Match radius around an intersection, metres
pub const DEFAULT_MATCH_THRESHOLD_M: f64 = 30.0;

/// Width of a time-of-day bin
pub const BIN_MINUTES: i64 = 15;

pub const TRAVEL_TIMES_SHEET: &str = "Travel Times";
pub const TIME_BINS_SHEET: &str = "Time Bins";

/// Travel time between two consecutive intersection hits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentTime {
    #[serde(rename = "route_ID")]
    pub route_id: String,
    pub segment_start: String,
    pub segment_finish: String,
    /// seconds
    pub travel_time: f64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

/// A segment travel time after run numbering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    #[serde(rename = "route_ID")]
    pub route_id: String,
    pub route: String,
    pub run_number: usize,
    pub segment_start: String,
    pub segment_finish: String,
    pub travel_time: f64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub source_file: String,
}

/// Walk a track and emit a segment each time a new intersection is reached.
///
/// The first intersection (in list order) within `threshold_m` of a point is
/// the match for that point. Consecutive hits on the same intersection still
/// produce a row; those are removed later by [`process_runs`].
pub fn match_points(
    points: &[TrackPoint],
    intersections: &[Intersection],
    threshold_m: f64,
    tz: Tz,
) -> Vec<SegmentTime> {
    let mut segments = Vec::new();
    let mut previous: Option<(&Intersection, NaiveDateTime)> = None;

    for point in points {
        let hit = intersections
            .iter()
            .find(|i| haversine_m(point.location, i.location) <= threshold_m);

        if let Some(intersection) = hit {
            let time = to_local(point.time, tz);
            if let Some((prev, prev_time)) = previous {
                segments.push(SegmentTime {
                    route_id: format!("{} / {}", prev.route_id, intersection.route_id),
                    segment_start: prev.segment_id.clone(),
                    segment_finish: intersection.segment_id.clone(),
                    travel_time: (time - prev_time).num_milliseconds() as f64 / 1000.0,
                    start_time: prev_time,
                    end_time: time,
                });
            }
            previous = Some((intersection, time));
        }
    }

    debug!("Matched {} segments from {} points", segments.len(), points.len());
    segments
}

/// Turn per-file segment lists into numbered runs.
///
/// Rows that start and finish at the same intersection are dropped. Each
/// remaining row is labelled `{start}_to_{finish}` and numbered within its
/// label in start-time order.
pub fn process_runs(files: Vec<(String, Vec<SegmentTime>)>) -> Vec<RunRecord> {
    let mut rows: Vec<RunRecord> = files
        .into_iter()
        .flat_map(|(source_file, segments)| {
            segments
                .into_iter()
                .filter(|s| s.segment_start != s.segment_finish)
                .map(move |s| RunRecord {
                    route: format!("{}_to_{}", s.segment_start, s.segment_finish),
                    route_id: s.route_id,
                    run_number: 0,
                    segment_start: s.segment_start,
                    segment_finish: s.segment_finish,
                    travel_time: s.travel_time,
                    start_time: s.start_time,
                    end_time: s.end_time,
                    source_file: source_file.clone(),
                })
        })
        .collect();

    rows.sort_by_key(|r| r.start_time);

    let mut counters: HashMap<String, usize> = HashMap::new();
    for row in rows.iter_mut() {
        let count = counters.entry(row.route.clone()).or_insert(0);
        *count += 1;
        row.run_number = *count;
    }

    info!("🚗 {} segment travel times across {} routes", rows.len(), counters.len());
    rows
}

fn floor_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_hms_opt(t.hour(), 0, 0).unwrap_or(t)
}

fn ceil_hour(t: NaiveDateTime) -> NaiveDateTime {
    let floor = floor_hour(t);
    if floor == t {
        t
    } else {
        floor + Duration::hours(1)
    }
}

/// 15-minute bin starts from the floor hour of `min` up to the ceiling hour of `max`
pub fn time_bins(min: NaiveDateTime, max: NaiveDateTime) -> Vec<NaiveDateTime> {
    let start = floor_hour(min);
    let end = ceil_hour(max);
    let step = Duration::minutes(BIN_MINUTES);

    let mut bins = vec![start];
    let mut current = start + step;
    while current < end {
        bins.push(current);
        current += step;
    }
    bins
}

/// Index of the `(start, start + 15 min]` bin holding `t`; the first bin
/// also takes its own start.
fn bin_index(bins: &[NaiveDateTime], t: NaiveDateTime) -> Option<usize> {
    let first = *bins.first()?;
    if t < first {
        return None;
    }
    let offset_ms = (t - first).num_milliseconds();
    let idx = if offset_ms == 0 {
        0
    } else {
        ((offset_ms - 1) / (BIN_MINUTES * 60 * 1000)) as usize
    };
    (idx < bins.len()).then_some(idx)
}

/// One row of the time-bin pivot
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedRoute {
    pub route_id: String,
    pub route: String,
    pub values: Vec<Option<f64>>,
    pub average: Option<f64>,
    pub std_deviation: Option<f64>,
}

/// Pivot run records into time-of-day bins.
///
/// Rows are keyed by (route_ID, route) in order of first appearance. Each
/// cell holds the first travel time starting in that bin.
pub fn pivot_by_bin(rows: &[RunRecord]) -> (Vec<NaiveDateTime>, Vec<BinnedRoute>) {
    let (Some(min), Some(max)) = (
        rows.iter().map(|r| r.start_time).min(),
        rows.iter().map(|r| r.start_time).max(),
    ) else {
        return (Vec::new(), Vec::new());
    };

    let bins = time_bins(min, max);
    let mut order: Vec<(String, String)> = Vec::new();
    let mut cells: HashMap<(String, String), Vec<Option<f64>>> = HashMap::new();

    for row in rows {
        let key = (row.route_id.clone(), row.route.clone());
        let values = cells.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            vec![None; bins.len()]
        });
        if let Some(idx) = bin_index(&bins, row.start_time) {
            if values[idx].is_none() {
                values[idx] = Some(row.travel_time);
            }
        }
    }

    let pivot = order
        .into_iter()
        .map(|key| {
            let values = cells.remove(&key).unwrap_or_default();
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            BinnedRoute {
                route_id: key.0,
                route: key.1,
                average: mean(&present),
                std_deviation: sample_std(&present),
                values,
            }
        })
        .collect();

    (bins, pivot)
}

fn bin_label(bins: &[NaiveDateTime], bin: NaiveDateTime) -> String {
    let single_day = bins.first().map(|b| b.date()) == bins.last().map(|b| b.date());
    if single_day {
        bin.format("%H:%M").to_string()
    } else {
        bin.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Build the two-sheet travel time report
pub fn build_travel_time_workbook(rows: &[RunRecord]) -> anyhow::Result<Workbook> {
    let (bins, pivot) = pivot_by_bin(rows);

    let mut headers = vec!["route_ID".to_string(), "route".to_string()];
    headers.extend(bins.iter().map(|b| bin_label(&bins, *b)));
    headers.push("average".to_string());
    headers.push("std_deviation".to_string());

    let mut bin_sheet = Sheet::new(TIME_BINS_SHEET, headers);
    for route in pivot {
        let mut cells = vec![route.route_id, route.route];
        cells.extend(route.values.into_iter().map(fmt_cell));
        cells.push(fmt_cell(route.average));
        cells.push(fmt_cell(route.std_deviation));
        bin_sheet.push_row(cells);
    }

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records(TRAVEL_TIMES_SHEET, rows)?)
        .add_sheet(bin_sheet);
    Ok(workbook)
}

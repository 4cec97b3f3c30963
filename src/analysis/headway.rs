//! Vehicle count cleaning and headway calculation
//!
//! Counts are recorded as a stream of events: `Start` and `Stop` mark the
//! edges of a count window and every vehicle in between is one row.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ToolError;
use crate::report::{fmt_cell, Sheet};
use crate::utils::{parse_clock_time, parse_local_timestamp};

pub const START: &str = "Start";
pub const STOP: &str = "Stop";

#[derive(Debug, Deserialize)]
struct RawCountRow {
    #[serde(rename = "Time Stamp")]
    time_stamp: Option<String>,
    #[serde(rename = "Vehicle")]
    vehicle: Option<String>,
    #[serde(rename = "Direction", default)]
    direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountEvent {
    pub time_stamp: NaiveTime,
    pub vehicle: String,
    pub direction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadwayRow {
    #[serde(rename = "Run")]
    pub run: u32,
    #[serde(rename = "Time Stamp")]
    pub time_stamp: NaiveTime,
    #[serde(rename = "Direction")]
    pub direction: String,
    #[serde(rename = "Vehicle")]
    pub vehicle: String,
    #[serde(rename = "Headway")]
    pub headway_s: Option<f64>,
    #[serde(rename = "Following")]
    pub following: Option<String>,
    #[serde(rename = "Group")]
    pub group: Option<String>,
}

fn parse_time_stamp(value: &str) -> Result<NaiveTime> {
    parse_clock_time(value)
        .or_else(|_| parse_local_timestamp(value).map(|dt| dt.time()))
        .map_err(Into::into)
}

/// Read a count sheet exported as CSV. Rows missing a time stamp or vehicle are dropped.
pub fn read_count_csv(path: &Path) -> Result<Vec<CountEvent>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let source_name = path.display().to_string();
    for required in ["Time Stamp", "Vehicle"] {
        if !headers.iter().any(|h| h.trim() == required) {
            return Err(ToolError::missing_column(required, &source_name).into());
        }
    }

    let mut events = Vec::new();
    for row in reader.deserialize::<RawCountRow>() {
        let row = row?;
        let (Some(time_stamp), Some(vehicle)) = (
            row.time_stamp.filter(|t| !t.trim().is_empty()),
            row.vehicle.filter(|v| !v.trim().is_empty()),
        ) else {
            continue;
        };
        events.push(CountEvent {
            time_stamp: parse_time_stamp(&time_stamp)?,
            vehicle: vehicle.trim().to_string(),
            direction: row.direction.unwrap_or_default().trim().to_string(),
        });
    }
    Ok(events)
}

/// Keep only complete `Start ... Stop` windows.
///
/// A `Start` with no matching `Stop` is discarded along with its rows, and
/// an empty window (a `Start` immediately followed by `Stop`) is removed.
pub fn clean_segments(events: &[CountEvent]) -> Vec<CountEvent> {
    let mut kept = Vec::new();
    let mut start_idx: Option<usize> = None;

    for (i, event) in events.iter().enumerate() {
        match event.vehicle.as_str() {
            START => start_idx = Some(i),
            STOP => {
                if let Some(start) = start_idx.take() {
                    if i > start + 1 {
                        kept.extend_from_slice(&events[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    debug!("Kept {} of {} count rows", kept.len(), events.len());
    kept
}

fn group_for(vehicle: &str, following: Option<&str>) -> Option<String> {
    let vehicle_ok = matches!(vehicle, "Car" | "Truck");
    let following = following?;
    let following_ok = matches!(following, "Car" | "Truck" | START);
    (vehicle_ok && following_ok).then(|| format!("{} Following {}", vehicle, following))
}

/// Number runs and compute headways over cleaned, combined count files
pub fn calculate_headways(files: Vec<Vec<CountEvent>>) -> Vec<HeadwayRow> {
    let mut events: Vec<CountEvent> = files.iter().flat_map(|f| clean_segments(f)).collect();
    events.sort_by_key(|e| e.time_stamp);

    let mut rows = Vec::with_capacity(events.len());
    let mut run = 0u32;
    let mut previous: Option<&CountEvent> = None;

    for event in &events {
        if event.vehicle == START {
            run += 1;
        }
        let following = previous.map(|p| if p.vehicle == "Probe" { "Car".to_string() } else { p.vehicle.clone() });
        let headway_s = match (previous, event.vehicle.as_str()) {
            (_, START) | (_, STOP) | (None, _) => None,
            (Some(prev), _) => Some((event.time_stamp - prev.time_stamp).num_milliseconds() as f64 / 1000.0),
        };
        rows.push(HeadwayRow {
            run,
            time_stamp: event.time_stamp,
            direction: event.direction.clone(),
            vehicle: event.vehicle.clone(),
            headway_s,
            group: group_for(&event.vehicle, following.as_deref()),
            following,
        });
        previous = Some(event);
    }

    info!("🚦 {} count rows across {} runs", rows.len(), run);
    rows
}

/// One column of headways per group, in order of first appearance, padded with blanks
pub fn format_headway(rows: &[HeadwayRow]) -> Sheet {
    let mut order: Vec<&str> = Vec::new();
    let mut columns: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    for row in rows {
        let Some(group) = row.group.as_deref() else { continue };
        columns
            .entry(group)
            .or_insert_with(|| {
                order.push(group);
                Vec::new()
            })
            .push(row.headway_s);
    }

    let height = columns.values().map(Vec::len).max().unwrap_or(0);
    let mut sheet = Sheet::new("Headways", order.iter().map(|g| g.to_string()).collect());
    for i in 0..height {
        sheet.push_row(
            order
                .iter()
                .map(|g| fmt_cell(columns.get(g).and_then(|c| c.get(i).copied().flatten())))
                .collect(),
        );
    }
    sheet
}

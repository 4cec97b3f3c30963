//! PeMS detector-health text export reader

use std::io::Read;

use crate::error::{ToolError, ToolResult};
use crate::models::PemsLaneReading;
use crate::utils::parse_local_timestamp;

pub const MAX_LANES: u8 = 6;

fn parse_optional(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.replace(',', "").parse::<f64>().ok())
}

/// Melt the wide per-lane export into one row per (sample time, lane).
///
/// Lanes whose flow column is absent are skipped; a lane with a flow
/// column but no speed column yields readings with `speed = None`.
pub fn parse_pems_export<R: Read>(source: R, station: &str, source_name: &str) -> ToolResult<Vec<PemsLaneReading>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(source);
    let headers = reader.headers()?.clone();

    let time_idx = headers
        .iter()
        .position(|h| h.trim() == "Sample Time")
        .ok_or_else(|| ToolError::missing_column("Sample Time", source_name))?;

    let mut lanes = Vec::new();
    for lane in 1..=MAX_LANES {
        let flow = format!("{} Lane {} Flow", station, lane);
        let speed = format!("{} Lane {} Speed - Used in Calculations", station, lane);
        if let Some(flow_idx) = headers.iter().position(|h| h.trim() == flow) {
            let speed_idx = headers.iter().position(|h| h.trim() == speed);
            lanes.push((lane, flow_idx, speed_idx));
        }
    }

    if lanes.is_empty() {
        return Err(ToolError::missing_column(&format!("{} Lane 1 Flow", station), source_name));
    }

    let mut readings = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(raw_time) = record.get(time_idx).filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        let reading_time = parse_local_timestamp(raw_time)?;

        for &(lane, flow_idx, speed_idx) in &lanes {
            readings.push(PemsLaneReading {
                station_id: station.to_string(),
                reading_time,
                lane,
                volume: parse_optional(record.get(flow_idx)),
                speed: speed_idx.and_then(|i| parse_optional(record.get(i))),
            });
        }
    }

    Ok(readings)
}

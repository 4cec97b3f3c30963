//! PeMS-style volume rollups
//!
//! The same daily and monthly rollups are produced for PeMS detector exports
//! and for ATSPM turning movement counts remapped onto PeMS stations.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::{PemsLaneReading, TmcRecord};
use crate::report::{Sheet, Workbook};
use crate::utils::{mean, parse_clock_time};

/// q1: lanes summed per station and reading time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReading {
    #[serde(rename = "StationID")]
    pub station_id: String,
    #[serde(rename = "ReadingDateTime")]
    pub reading_time: NaiveDateTime,
    #[serde(rename = "SumOfVolume")]
    pub sum_of_volume: f64,
    #[serde(rename = "AvgOfSpeed")]
    pub avg_of_speed: Option<f64>,
}

/// q2: q1 with calendar parts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedReading {
    #[serde(rename = "StationID")]
    pub station_id: String,
    #[serde(rename = "ReadingDateTime")]
    pub reading_time: NaiveDateTime,
    #[serde(rename = "SumOfVolume")]
    pub sum_of_volume: f64,
    #[serde(rename = "AvgOfSpeed")]
    pub avg_of_speed: Option<f64>,
    #[serde(rename = "DayDate")]
    pub day: u32,
    #[serde(rename = "MonthDate")]
    pub month: u32,
    #[serde(rename = "HourDate")]
    pub hour: u32,
    #[serde(rename = "DOW")]
    pub dow: u32,
}

/// q3: one row per station and day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyVolume {
    #[serde(rename = "StationID")]
    pub station_id: String,
    #[serde(rename = "MonthDate")]
    pub month: u32,
    #[serde(rename = "DayDate")]
    pub day: u32,
    #[serde(rename = "DOW")]
    pub dow: u32,
    #[serde(rename = "SumOfSumOfVolume")]
    pub sum_of_sum_of_volume: f64,
    #[serde(rename = "AvgOfAvgOfSpeed")]
    pub avg_of_avg_of_speed: Option<f64>,
}

/// q4: one row per station and month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyVolume {
    #[serde(rename = "StationID")]
    pub station_id: String,
    #[serde(rename = "MonthDate")]
    pub month: u32,
    #[serde(rename = "AvgOfSumOfSumOfVolume")]
    pub avg_of_sum_of_sum_of_volume: Option<f64>,
    #[serde(rename = "AvgOfAvgOfAvgOfSpeed")]
    pub avg_of_avg_of_avg_of_speed: Option<f64>,
}

/// Sunday = 1 ... Saturday = 7
pub fn day_of_week(t: NaiveDateTime) -> u32 {
    t.weekday().number_from_sunday()
}

/// Sum lane volumes and average lane speeds per (station, time)
pub fn sum_lanes(readings: &[PemsLaneReading]) -> Vec<StationReading> {
    let mut groups: BTreeMap<(&str, NaiveDateTime), (f64, Vec<f64>)> = BTreeMap::new();
    for r in readings {
        let entry = groups.entry((r.station_id.as_str(), r.reading_time)).or_default();
        entry.0 += r.volume.unwrap_or(0.0);
        if let Some(speed) = r.speed {
            entry.1.push(speed);
        }
    }
    groups
        .into_iter()
        .map(|((station, time), (volume, speeds))| StationReading {
            station_id: station.to_string(),
            reading_time: time,
            sum_of_volume: volume,
            avg_of_speed: mean(&speeds),
        })
        .collect()
}

pub fn add_date_parts(rows: &[StationReading]) -> Vec<DatedReading> {
    rows.iter()
        .map(|r| DatedReading {
            station_id: r.station_id.clone(),
            reading_time: r.reading_time,
            sum_of_volume: r.sum_of_volume,
            avg_of_speed: r.avg_of_speed,
            day: r.reading_time.day(),
            month: r.reading_time.month(),
            hour: r.reading_time.hour(),
            dow: day_of_week(r.reading_time),
        })
        .collect()
}

pub fn daily_volumes(rows: &[DatedReading]) -> Vec<DailyVolume> {
    let mut groups: BTreeMap<(&str, u32, u32, u32), (f64, Vec<f64>)> = BTreeMap::new();
    for r in rows {
        let entry = groups.entry((r.station_id.as_str(), r.month, r.day, r.dow)).or_default();
        entry.0 += r.sum_of_volume;
        if let Some(speed) = r.avg_of_speed {
            entry.1.push(speed);
        }
    }
    groups
        .into_iter()
        .map(|((station, month, day, dow), (volume, speeds))| DailyVolume {
            station_id: station.to_string(),
            month,
            day,
            dow,
            sum_of_sum_of_volume: volume,
            avg_of_avg_of_speed: mean(&speeds),
        })
        .collect()
}

pub fn monthly_volumes(rows: &[DailyVolume]) -> Vec<MonthlyVolume> {
    let mut groups: BTreeMap<(&str, u32), (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in rows {
        let entry = groups.entry((r.station_id.as_str(), r.month)).or_default();
        entry.0.push(r.sum_of_sum_of_volume);
        if let Some(speed) = r.avg_of_avg_of_speed {
            entry.1.push(speed);
        }
    }
    groups
        .into_iter()
        .map(|((station, month), (volumes, speeds))| MonthlyVolume {
            station_id: station.to_string(),
            month,
            avg_of_sum_of_sum_of_volume: mean(&volumes),
            avg_of_avg_of_avg_of_speed: mean(&speeds),
        })
        .collect()
}

/// Run q1 through q4 and collect them as sheets
pub fn pems_rollup_workbook(readings: &[PemsLaneReading]) -> Result<Workbook> {
    let q1 = sum_lanes(readings);
    let q2 = add_date_parts(&q1);
    let q3 = daily_volumes(&q2);
    let q4 = monthly_volumes(&q3);
    info!("📈 PeMS rollup: {} readings, {} station-days, {} station-months", q1.len(), q3.len(), q4.len());

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records("SumofLanes", &q1)?)
        .add_sheet(Sheet::from_records("SumofLaneswithDates", &q2)?)
        .add_sheet(Sheet::from_records("DailyVolumesbyMonth", &q3)?)
        .add_sheet(Sheet::from_records("DailyVolumesbyMonthAve", &q4)?);
    Ok(workbook)
}

/// Maps a TMC approach and movement onto a PeMS-style station direction.
/// A movement of `*` matches every movement on the approach.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationRule {
    pub direction: String,
    pub movement: String,
    pub station_direction: String,
}

impl StationRule {
    pub fn matches(&self, record: &TmcRecord) -> bool {
        self.direction == record.direction && (self.movement == "*" || self.movement == record.movement)
    }
}

pub fn read_station_rules(path: &Path) -> Result<Vec<StationRule>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open station map {}", path.display()))?;
    let rules = reader.deserialize().collect::<Result<Vec<StationRule>, _>>()?;
    debug!("Loaded {} station rules", rules.len());
    Ok(rules)
}

/// Remap TMC rows onto stations and sum them per clock hour.
///
/// Each row is assigned to the first matching rule; rows no rule matches are
/// left out. Station ids are `{intersection}_{station_direction}`.
pub fn tmc_to_station_hours(records: &[TmcRecord], rules: &[StationRule]) -> Result<Vec<StationReading>> {
    let mut groups: BTreeMap<(String, NaiveDateTime), f64> = BTreeMap::new();
    let mut unmatched = 0usize;

    for record in records {
        let Some(rule) = rules.iter().find(|r| r.matches(record)) else {
            unmatched += 1;
            continue;
        };
        let time = parse_clock_time(&record.time)?;
        let hour = record
            .date
            .and_hms_opt(time.hour(), 0, 0)
            .unwrap_or_else(|| record.date.and_time(time));
        let station = format!("{}_{}", record.intersection_id, rule.station_direction);
        *groups.entry((station, hour)).or_default() += record.volume as f64;
    }

    if unmatched > 0 {
        warn!("⚠️  {} TMC rows did not match any station rule", unmatched);
    }

    Ok(groups
        .into_iter()
        .map(|((station_id, reading_time), volume)| StationReading {
            station_id,
            reading_time,
            sum_of_volume: volume,
            avg_of_speed: None,
        })
        .collect())
}

/// TMC counts in PeMS layout: hourly, daily and monthly sheets
pub fn tmc_rollup_workbook(records: &[TmcRecord], rules: &[StationRule]) -> Result<Workbook> {
    let hourly = add_date_parts(&tmc_to_station_hours(records, rules)?);
    let daily = daily_volumes(&hourly);
    let monthly = monthly_volumes(&daily);
    info!("📈 TMC rollup: {} station-hours, {} station-days", hourly.len(), daily.len());

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records("TMC_data", records)?)
        .add_sheet(Sheet::from_records("Daily_format", &hourly)?)
        .add_sheet(Sheet::from_records("Daily_volumes", &daily)?)
        .add_sheet(Sheet::from_records("Monthly_format", &monthly)?);
    Ok(workbook)
}

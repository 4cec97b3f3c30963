//! Before/after speed contour comparison along ClearGuide routes

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::geo::haversine_miles;
use crate::models::clearguide::ContourPoint;
use crate::models::{ContourReading, DateRange};
use crate::parsers::Placemark;
use crate::utils::{mean, round_to, to_local};

/// Travel direction of a ClearGuide route
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RouteDirection {
    Northbound,
    Southbound,
    Eastbound,
    Westbound,
}

/// Flatten a contour response into one reading per (timestamp, distance)
pub fn flatten_contours(route_id: i64, points: Vec<ContourPoint>) -> Vec<ContourReading> {
    let mut readings = Vec::new();
    for (ts, cells) in points {
        let Some(timestamp) = DateTime::<Utc>::from_timestamp(ts as i64, 0) else {
            warn!("⚠️  Route {}: timestamp {} out of range", route_id, ts);
            continue;
        };
        readings.extend(cells.into_iter().map(|(distance, speed)| ContourReading {
            route_id,
            timestamp,
            distance,
            speed,
        }));
    }
    readings
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContourCell {
    pub route_id: i64,
    pub local_time: NaiveDateTime,
    pub hour: u32,
    /// distance rounded to hundredths of a mile, stored as an integer key
    pub distance_key: i64,
    pub speed: Option<f64>,
}

/// Localize readings, bin distances and drop Friday through Sunday
pub fn prepare_cells(readings: &[ContourReading], tz: Tz) -> Vec<ContourCell> {
    readings
        .iter()
        .filter_map(|r| {
            let local_time = to_local(r.timestamp, tz);
            if matches!(local_time.weekday(), Weekday::Fri | Weekday::Sat | Weekday::Sun) {
                return None;
            }
            Some(ContourCell {
                route_id: r.route_id,
                local_time,
                hour: local_time.hour(),
                distance_key: (r.distance * 100.0).round() as i64,
                speed: r.speed,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedChange {
    pub route_id: i64,
    pub hour: u32,
    pub binned_distance: f64,
    pub before_speed: Option<f64>,
    pub after_speed: Option<f64>,
    pub speed_difference: Option<f64>,
}

type CellKey = (i64, u32, i64);

fn window_means(cells: &[ContourCell], window: DateRange) -> BTreeMap<CellKey, Option<f64>> {
    let mut groups: BTreeMap<CellKey, Vec<f64>> = BTreeMap::new();
    for cell in cells {
        let day = cell.local_time.date();
        if day < window.start || day > window.end {
            continue;
        }
        let entry = groups.entry((cell.route_id, cell.hour, cell.distance_key)).or_default();
        if let Some(speed) = cell.speed {
            entry.push(speed);
        }
    }
    groups.into_iter().map(|(k, v)| (k, mean(&v))).collect()
}

/// Mean speed per (route, hour, distance) in each window, outer-joined
pub fn compare_windows(cells: &[ContourCell], before: DateRange, after: DateRange) -> Vec<SpeedChange> {
    let before_means = window_means(cells, before);
    let mut after_means = window_means(cells, after);

    let mut merged: BTreeMap<CellKey, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for (key, speed) in before_means {
        merged.insert(key, (speed, after_means.remove(&key).flatten()));
    }
    for (key, speed) in after_means {
        merged.insert(key, (None, speed));
    }

    debug!("{} contour cells compared", merged.len());
    merged
        .into_iter()
        .map(|((route_id, hour, distance_key), (before_speed, after_speed))| SpeedChange {
            route_id,
            hour,
            binned_distance: distance_key as f64 / 100.0,
            before_speed,
            after_speed,
            speed_difference: match (before_speed, after_speed) {
                (Some(b), Some(a)) => Some(a - b),
                _ => None,
            },
        })
        .collect()
}

/// Distance of every intersection from the start of the route, in miles.
///
/// Northbound and eastbound routes start at the last placemark, all others
/// at the first.
pub fn intersection_distances(placemarks: &[Placemark], direction: RouteDirection) -> Vec<(String, f64)> {
    let start = match direction {
        RouteDirection::Northbound | RouteDirection::Eastbound => placemarks.last(),
        RouteDirection::Southbound | RouteDirection::Westbound => placemarks.first(),
    };
    let Some(start) = start else {
        return Vec::new();
    };
    placemarks
        .iter()
        .map(|p| (p.name.clone(), round_to(haversine_miles(start.location, p.location), 2)))
        .collect()
}

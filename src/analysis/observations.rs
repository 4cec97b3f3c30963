//! Speed observations along a corridor from GPX tracks

use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

use crate::geo::haversine_miles;
use crate::models::TrackPoint;
use crate::parsers::Placemark;
use crate::utils::to_local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedCategory {
    #[serde(rename = "Below 3 mph")]
    Below3,
    #[serde(rename = "3-15 mph")]
    From3To15,
    #[serde(rename = "15-30 mph")]
    From15To30,
    #[serde(rename = "Above 30 mph")]
    Above30,
}

impl SpeedCategory {
    /// Right-closed bins: (-inf, 3], (3, 15], (15, 30], (30, inf)
    pub fn from_mph(speed: f64) -> Self {
        if speed <= 3.0 {
            SpeedCategory::Below3
        } else if speed <= 15.0 {
            SpeedCategory::From3To15
        } else if speed <= 30.0 {
            SpeedCategory::From15To30
        } else {
            SpeedCategory::Above30
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedCategory::Below3 => "Below 3 mph",
            SpeedCategory::From3To15 => "3-15 mph",
            SpeedCategory::From15To30 => "15-30 mph",
            SpeedCategory::Above30 => "Above 30 mph",
        }
    }
}

impl fmt::Display for SpeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which coordinate runs along the corridor
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CorridorAxis {
    /// North-south corridor, positioned by latitude
    #[value(name = "NS")]
    NorthSouth,
    /// East-west corridor, positioned by longitude
    #[value(name = "EW")]
    EastWest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub source_file: String,
    pub time_of_day: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub speed_category: SpeedCategory,
    pub intersection: String,
    pub position: f64,
}

/// Speed of each point relative to the one before it, in mph
pub fn point_speeds(points: &[TrackPoint]) -> Vec<f64> {
    let mut speeds = Vec::with_capacity(points.len());
    let mut previous: Option<&TrackPoint> = None;
    for point in points {
        let speed = match previous {
            Some(prev) => {
                let hours = (point.time - prev.time).num_milliseconds() as f64 / 3_600_000.0;
                if hours != 0.0 {
                    haversine_miles(prev.location, point.location) / hours
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        speeds.push(speed);
        previous = Some(point);
    }
    speeds
}

fn nearest<'a>(point: &TrackPoint, placemarks: &'a [Placemark]) -> Option<&'a Placemark> {
    placemarks
        .iter()
        .map(|p| (p, haversine_miles(point.location, p.location)))
        .fold(None, |best: Option<(&Placemark, f64)>, (p, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((p, d)),
        })
        .map(|(p, _)| p)
}

/// Tag every track point with speed, category and nearest key intersection
pub fn build_observations(
    source_file: &str,
    points: &[TrackPoint],
    placemarks: &[Placemark],
    axis: CorridorAxis,
    tz: Tz,
) -> Vec<Observation> {
    let speeds = point_speeds(points);
    points
        .iter()
        .zip(speeds)
        .map(|(point, speed)| Observation {
            source_file: source_file.to_string(),
            time_of_day: to_local(point.time, tz).format("%H:%M:%S").to_string(),
            latitude: point.location.lat,
            longitude: point.location.lon,
            speed,
            speed_category: SpeedCategory::from_mph(speed),
            intersection: nearest(point, placemarks).map(|p| p.name.clone()).unwrap_or_default(),
            position: match axis {
                CorridorAxis::NorthSouth => point.location.lat,
                CorridorAxis::EastWest => point.location.lon,
            },
        })
        .collect()
}

/// Intersection name and its coordinate along the corridor axis
pub fn axis_ticks(placemarks: &[Placemark], axis: CorridorAxis) -> Vec<(String, f64)> {
    placemarks
        .iter()
        .map(|p| {
            let coord = match axis {
                CorridorAxis::NorthSouth => p.location.lat,
                CorridorAxis::EastWest => p.location.lon,
            };
            (p.name.clone(), coord)
        })
        .collect()
}

//! Intersection marker loading from CSV, KML or KMZ

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::{ToolError, ToolResult};
use crate::geo::GeoPoint;
use crate::models::Intersection;
use crate::parsers::kml::{read_kml_file, read_kmz_file, Placemark};

#[derive(Debug, Deserialize)]
struct IntersectionRow {
    #[serde(rename = "routeID")]
    route_id: String,
    #[serde(rename = "segmentID")]
    segment_id: String,
    /// latitude
    x: f64,
    /// longitude
    y: f64,
}

/// Read intersections from a CSV with `routeID, segmentID, x, y` columns (x = latitude)
pub fn read_intersections_csv(path: &Path) -> ToolResult<Vec<Intersection>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in ["routeID", "segmentID", "x", "y"] {
        if !headers.iter().any(|h| h == column) {
            return Err(ToolError::missing_column(column, &path.display().to_string()));
        }
    }

    let mut intersections = Vec::new();
    for row in reader.deserialize::<IntersectionRow>() {
        let row = row?;
        intersections.push(Intersection {
            route_id: row.route_id,
            segment_id: row.segment_id,
            location: GeoPoint::new(row.x, row.y),
        });
    }
    Ok(intersections)
}

impl From<Placemark> for Intersection {
    fn from(pm: Placemark) -> Self {
        Intersection {
            route_id: pm.name.clone(),
            segment_id: pm.name,
            location: pm.location,
        }
    }
}

/// Load intersections, choosing the reader by file extension
pub fn load_intersections(path: &Path) -> ToolResult<Vec<Intersection>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let intersections: Vec<Intersection> = match extension.as_str() {
        "csv" => read_intersections_csv(path)?,
        "kml" => read_kml_file(path)?.into_iter().map(Intersection::from).collect(),
        "kmz" => read_kmz_file(path)?.into_iter().map(Intersection::from).collect(),
        _ => return Err(ToolError::UnsupportedFile(path.display().to_string())),
    };

    if intersections.is_empty() {
        return Err(ToolError::Empty(format!("no intersections in {}", path.display())));
    }

    info!("📍 Loaded {} intersections from {}", intersections.len(), path.display());
    Ok(intersections)
}

//! KML / KMZ placemark reader

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::geo::GeoPoint;

/// Named point placemark
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    pub name: String,
    pub location: GeoPoint,
}

/// Parse `lon,lat[,alt]` into a point
fn parse_coordinates(text: &str) -> ToolResult<GeoPoint> {
    // Points carry a single tuple; anything after the first whitespace belongs to a line string
    let first = text
        .split_whitespace()
        .next()
        .ok_or_else(|| ToolError::malformed("KML", "empty <coordinates>"))?;
    let mut parts = first.split(',');
    let lon = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
    let lat = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(GeoPoint::new(lat, lon)),
        _ => Err(ToolError::malformed("KML", format!("bad coordinates '{}'", text.trim()))),
    }
}

#[derive(Default)]
struct PendingPlacemark {
    name: Option<String>,
    coordinates: Option<String>,
    is_point: bool,
}

/// Read every `<Placemark>` with a `<Point>` geometry, in document order.
///
/// Placemarks with line or polygon geometry are ignored. A point placemark
/// without a name is an error, since the name identifies the intersection.
pub fn parse_kml<R: BufRead>(source: R) -> ToolResult<Vec<Placemark>> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut placemarks = Vec::new();
    let mut current: Option<PendingPlacemark> = None;
    let mut tag: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"Placemark" => current = Some(PendingPlacemark::default()),
                    b"Point" => {
                        if let Some(pm) = current.as_mut() {
                            pm.is_point = true;
                        }
                    }
                    _ => {}
                }
                tag = Some(name);
            }
            Event::Text(t) => {
                if let (Some(pm), Some(name)) = (current.as_mut(), tag.as_deref()) {
                    let text = t
                        .unescape()
                        .map_err(|err| ToolError::malformed("KML", err.to_string()))?
                        .into_owned();
                    match name {
                        // Only the placemark's own name, not a nested ExtendedData name
                        b"name" if pm.name.is_none() => pm.name = Some(text.trim().to_string()),
                        b"coordinates" if pm.is_point => pm.coordinates = Some(text),
                        _ => {}
                    }
                }
            }
            Event::CData(c) => {
                if let (Some(pm), Some(b"name")) = (current.as_mut(), tag.as_deref()) {
                    if pm.name.is_none() {
                        let raw = c.into_inner();
                        pm.name = Some(String::from_utf8_lossy(&raw).trim().to_string());
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"Placemark" {
                    if let Some(pm) = current.take() {
                        if let Some(coords) = pm.coordinates {
                            let name = pm.name.ok_or_else(|| {
                                ToolError::malformed("KML", "point placemark without <name>")
                            })?;
                            placemarks.push(Placemark {
                                name,
                                location: parse_coordinates(&coords)?,
                            });
                        } else if pm.is_point {
                            warn!("⚠️ Point placemark without coordinates skipped");
                        }
                    }
                }
                tag = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    debug!("Parsed {} placemarks", placemarks.len());
    Ok(placemarks)
}

/// Read placemarks from a `.kml` or `.kmz` file
pub fn read_placemarks(path: &Path) -> ToolResult<Vec<Placemark>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "kml" => read_kml_file(path),
        "kmz" => read_kmz_file(path),
        _ => Err(ToolError::UnsupportedFile(path.display().to_string())),
    }
}

pub fn read_kml_file(path: &Path) -> ToolResult<Vec<Placemark>> {
    let file = File::open(path)?;
    parse_kml(BufReader::new(file))
}

/// Read the first `.kml` document inside a KMZ archive
pub fn read_kmz_file(path: &Path) -> ToolResult<Vec<Placemark>> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    let kml_index = (0..archive.len())
        .find(|&i| {
            archive
                .by_index(i)
                .map(|entry| entry.name().to_ascii_lowercase().ends_with(".kml"))
                .unwrap_or(false)
        })
        .ok_or_else(|| ToolError::malformed("KMZ", format!("no .kml entry in {}", path.display())))?;

    let mut contents = Vec::new();
    archive.by_index(kml_index)?.read_to_end(&mut contents)?;
    parse_kml(contents.as_slice())
}

//! GPX track reader

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::geo::GeoPoint;
use crate::models::TrackPoint;
use crate::utils::parse_utc_timestamp;

#[derive(Default)]
struct PendingPoint {
    lat: f64,
    lon: f64,
    ele: Option<f64>,
    time: Option<String>,
}

fn attribute_f64(e: &BytesStart<'_>, name: &str) -> ToolResult<f64> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| ToolError::malformed("GPX", err.to_string()))?
        .ok_or_else(|| ToolError::malformed("GPX", format!("trkpt without '{}'", name)))?;
    let value = attr
        .unescape_value()
        .map_err(|err| ToolError::malformed("GPX", err.to_string()))?;
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ToolError::malformed("GPX", format!("bad {} '{}'", name, value)))
}

fn start_point(e: &BytesStart<'_>) -> ToolResult<PendingPoint> {
    Ok(PendingPoint {
        lat: attribute_f64(e, "lat")?,
        lon: attribute_f64(e, "lon")?,
        ..Default::default()
    })
}

/// Read every track point, in document order, from a GPX document.
///
/// Track segments and multiple tracks are flattened. Points without a
/// `<time>` element cannot be used for travel times and are skipped.
pub fn parse_gpx<R: BufRead>(source: R) -> ToolResult<Vec<TrackPoint>> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut points = Vec::new();
    let mut current: Option<PendingPoint> = None;
    let mut tag: Option<Vec<u8>> = None;
    let mut skipped = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"trkpt" {
                    current = Some(start_point(&e)?);
                }
                tag = Some(name);
            }
            Event::Empty(e) => {
                // <trkpt lat=".." lon=".."/> carries no time
                if e.local_name().as_ref() == b"trkpt" {
                    skipped += 1;
                }
            }
            Event::Text(t) => {
                if let (Some(point), Some(name)) = (current.as_mut(), tag.as_deref()) {
                    let text = t
                        .unescape()
                        .map_err(|err| ToolError::malformed("GPX", err.to_string()))?;
                    match name {
                        b"time" => point.time = Some(text.into_owned()),
                        b"ele" => point.ele = text.trim().parse::<f64>().ok(),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some(point) = current.take() {
                        match point.time {
                            Some(time) => points.push(TrackPoint {
                                location: GeoPoint::new(point.lat, point.lon),
                                elevation: point.ele,
                                time: parse_utc_timestamp(&time)?,
                            }),
                            None => skipped += 1,
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

    if skipped > 0 {
        warn!("⚠️ Skipped {} track points without timestamps", skipped);
    }
    debug!("Parsed {} track points", points.len());
    Ok(points)
}

/// Read a GPX file from disk
pub fn read_gpx_file(path: &Path) -> ToolResult<Vec<TrackPoint>> {
    let file = File::open(path)?;
    parse_gpx(BufReader::new(file))
}

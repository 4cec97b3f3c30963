//! File and page readers

pub mod gpx;
pub mod intersections;
pub mod kml;
pub mod pems;
pub mod tmc_html;

pub use gpx::{parse_gpx, read_gpx_file};
pub use intersections::load_intersections;
pub use kml::{read_kml_file, read_kmz_file, read_placemarks, Placemark};
pub use pems::parse_pems_export;
pub use tmc_html::{parse_tmc_table, ParsedTmc};

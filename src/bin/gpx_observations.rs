use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use avenue_tools::analysis::observations::{axis_ticks, build_observations, CorridorAxis};
use avenue_tools::models::Config;
use avenue_tools::parsers::{read_gpx_file, read_placemarks};
use avenue_tools::report::write_csv;
use avenue_tools::utils::init_logging;

#[derive(serde::Serialize)]
struct AxisTick {
    intersection: String,
    position: f64,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Point speed observations from GPX runs",
    long_about = "Point speed observations from GPX runs.\n\n\
        Each track point gets a speed from the previous point, a speed category and the\n\
        nearest key intersection from the KML/KMZ markers. Rows are written to one CSV with\n\
        the intersection axis ticks alongside.\n\n\
        Examples:\n  \
        gpx_observations --gpx-dir runs/ --markers state_st.kml --axis NS\n  \
        gpx_observations --gpx-dir runs/ --markers corridor.kmz --axis EW -o ew.csv"
)]
struct Args {
    /// Folder of .gpx files
    #[arg(long)]
    gpx_dir: PathBuf,

    /// Key intersection markers (.kml or .kmz)
    #[arg(long)]
    markers: PathBuf,

    /// Corridor orientation
    #[arg(long, value_enum, default_value = "NS")]
    axis: CorridorAxis,

    /// Observation CSV
    #[arg(short, long, default_value = "observations.csv")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let placemarks = read_placemarks(&args.markers)?;
    info!("📍 {} key intersections", placemarks.len());

    let mut gpx_files: Vec<PathBuf> = std::fs::read_dir(&args.gpx_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("gpx"))
        })
        .collect();
    gpx_files.sort();

    let mut observations = Vec::new();
    for path in &gpx_files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match read_gpx_file(path) {
            Ok(points) => observations.extend(build_observations(
                &name,
                &points,
                &placemarks,
                args.axis,
                config.local_timezone,
            )),
            Err(e) => warn!("⚠️  Skipping {}: {}", name, e),
        }
    }

    write_csv(&args.output, &observations)?;

    let ticks: Vec<AxisTick> = axis_ticks(&placemarks, args.axis)
        .into_iter()
        .map(|(intersection, position)| AxisTick { intersection, position })
        .collect();
    write_csv(&args.output.with_file_name("axis_ticks.csv"), &ticks)?;

    info!("🎉 {} observations from {} runs", observations.len(), gpx_files.len());
    Ok(())
}

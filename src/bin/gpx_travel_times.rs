//! Segment travel times from GPS runs

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use avenue_tools::analysis::travel_time::{
    build_travel_time_workbook, match_points, process_runs, DEFAULT_MATCH_THRESHOLD_M,
};
use avenue_tools::models::Config;
use avenue_tools::parsers::{load_intersections, read_gpx_file};
use avenue_tools::report::write_report;
use avenue_tools::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Reconstruct segment travel times from GPX runs",
    long_about = "Reconstruct segment travel times from GPX runs.\n\n\
        Every .gpx file in the folder is one run. Track points within the match radius of an\n\
        intersection become segment boundaries; the resulting segments are numbered per route\n\
        and pivoted into 15-minute time-of-day bins.\n\n\
        Examples:\n  \
        gpx_travel_times --gpx-dir runs/ --intersections intersections.csv\n  \
        gpx_travel_times --gpx-dir runs/ --intersections corridor.kmz --threshold-m 40 --output out/am"
)]
struct Args {
    /// Folder of .gpx files
    #[arg(long)]
    gpx_dir: PathBuf,

    /// Intersections as CSV (routeID, segmentID, x, y), KML or KMZ
    #[arg(long)]
    intersections: PathBuf,

    /// Match radius in metres
    #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD_M)]
    threshold_m: f64,

    /// Output folder for the report
    #[arg(short, long, default_value = "travel_times")]
    output: PathBuf,
}

/// Run label: the GPX file name without its extension
fn run_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    info!("🛰️  GPX Travel Times");
    let intersections = load_intersections(&args.intersections)?;

    let mut gpx_files: Vec<PathBuf> = std::fs::read_dir(&args.gpx_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("gpx"))
        })
        .collect();
    gpx_files.sort();
    info!("📂 {} GPX files in {}", gpx_files.len(), args.gpx_dir.display());

    let mut runs = Vec::new();
    for path in &gpx_files {
        let name = run_name(path);
        match read_gpx_file(path) {
            Ok(points) => {
                let segments = match_points(&points, &intersections, args.threshold_m, config.local_timezone);
                info!("   {}: {} points, {} segments", name, points.len(), segments.len());
                runs.push((name, segments));
            }
            Err(e) => warn!("⚠️  Skipping {}: {}", name, e),
        }
    }

    let rows = process_runs(runs);
    if rows.is_empty() {
        warn!("No segments matched; check the match radius and intersection file");
        return Ok(());
    }

    let workbook = build_travel_time_workbook(&rows)?;
    write_report(&args.output, "GPX Travel Times", &workbook)?;
    info!("🎉 {} segment travel times written", rows.len());
    Ok(())
}

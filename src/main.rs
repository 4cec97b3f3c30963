use anyhow::Result;

const TOOLS: &[(&str, &str)] = &[
    ("gpx_travel_times", "GPS runs + intersections -> segment travel times by 15-minute bin"),
    ("gpx_observations", "GPS runs + KML markers -> point speed observations"),
    ("atspm_tmc", "Scrape ATSPM turning movement counts into SQLite"),
    ("atspm_split_failure", "Collect split failure reports into SQLite"),
    ("atspm_pcd", "Collect Purdue coordination diagram reports into SQLite"),
    ("atspm_split_monitor", "Collect split monitor reports into SQLite"),
    ("clearguide_timeseries", "Store ClearGuide route average speeds"),
    ("clearguide_contours", "Before/after speed contour comparison for a route"),
    ("clearguide_download", "Request and save a daily ClearGuide bulk download"),
    ("travel_time_tool", "ClearGuide export folder -> before/after summary with outliers"),
    ("pems_download", "Download PeMS station exports"),
    ("pems_aggregate", "Roll PeMS exports up to daily and monthly volumes"),
    ("tmc_to_pems", "Reshape stored TMC counts into PeMS-style volume tables"),
    ("aog_compare", "Compare arrival-on-green between two date windows"),
    ("split_analysis", "Per-plan split, split failure and volume report"),
    ("tmc_dedupe", "Report duplicate TMC rows"),
    ("headway_counts", "Clean count sheets and compute headways"),
];

fn main() -> Result<()> {
    println!("🚦 AVENUE TOOLS");
    println!("===============");
    println!("Traffic engineering data utilities. Run a tool with:");
    println!("  cargo run --bin <tool> -- --help");
    println!();

    let width = TOOLS.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, description) in TOOLS {
        println!("  {:width$}  {}", name, description, width = width);
    }
    Ok(())
}

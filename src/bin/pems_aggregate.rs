use anyhow::{anyhow, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use avenue_tools::analysis::volumes::pems_rollup_workbook;
use avenue_tools::parsers::parse_pems_export;
use avenue_tools::report::write_report;
use avenue_tools::utils::init_logging;

/// Station id is the last `_` separated token of the file stem
fn station_from_file_name(path: &Path) -> Option<String> {
    path.file_stem()?
        .to_str()?
        .rsplit('_')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Roll PeMS exports up to daily and monthly volumes",
    long_about = "Roll PeMS exports up to daily and monthly volumes.\n\n\
        Every .tsv export in the folder is melted to per-lane readings, lanes are summed per\n\
        station and time, then averaged to daily totals by month and day of week.\n\n\
        Examples:\n  \
        pems_aggregate --folder pems/\n  \
        pems_aggregate --folder pems/ --output pems_rollup"
)]
struct Args {
    /// Folder of PeMS .tsv exports
    #[arg(short, long)]
    folder: PathBuf,

    /// Output folder for the report
    #[arg(short, long, default_value = "pems_rollup")]
    output: PathBuf,
}

fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&args.folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("tsv")))
        .collect();
    paths.sort();

    let mut readings = Vec::new();
    for path in &paths {
        let Some(station) = station_from_file_name(path) else {
            warn!("⚠️  Cannot tell the station of {}", path.display());
            continue;
        };
        let source_name = path.display().to_string();
        match parse_pems_export(File::open(path)?, &station, &source_name) {
            Ok(rows) => readings.extend(rows),
            Err(e) => warn!("⚠️  Skipping {}: {}", source_name, e),
        }
    }

    if readings.is_empty() {
        return Err(anyhow!("No PeMS readings found in {}", args.folder.display()));
    }
    info!("📊 {} lane readings from {} files", readings.len(), paths.len());

    let workbook = pems_rollup_workbook(&readings)?;
    write_report(&args.output, "PeMS Volumes", &workbook)?;
    Ok(())
}

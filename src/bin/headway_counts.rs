use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use avenue_tools::analysis::headway::{calculate_headways, format_headway, read_count_csv};
use avenue_tools::report::{write_report, Sheet, Workbook};
use avenue_tools::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Clean vehicle count sheets and compute headways",
    long_about = "Clean vehicle count sheets and compute headways.\n\n\
        Each count CSV needs 'Time Stamp' and 'Vehicle' columns ('Direction' is optional).\n\
        Only rows inside Start ... Stop windows are kept; empty windows are dropped. Files\n\
        are combined in time order, runs are numbered and headways grouped by vehicle pair.\n\n\
        Examples:\n  \
        headway_counts --file counts_am.csv --file counts_pm.csv\n  \
        headway_counts --folder counts/ -o headways"
)]
struct Args {
    /// Count CSV; repeat for several
    #[arg(long)]
    file: Vec<PathBuf>,

    /// Folder of count CSVs
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Output folder for the report
    #[arg(short, long, default_value = "headways")]
    output: PathBuf,
}

fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();

    let mut paths = args.file.clone();
    if let Some(folder) = &args.folder {
        let mut found: Vec<PathBuf> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")))
            .collect();
        found.sort();
        paths.extend(found);
    }
    if paths.is_empty() {
        return Err(anyhow!("Provide --file or --folder"));
    }

    let mut files = Vec::new();
    for path in &paths {
        match read_count_csv(path) {
            Ok(events) => files.push(events),
            Err(e) => warn!("⚠️  Skipping {}: {:#}", path.display(), e),
        }
    }

    let rows = calculate_headways(files);
    info!("📊 {} rows kept from {} files", rows.len(), paths.len());

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records("Combined", &rows)?)
        .add_sheet(format_headway(&rows));
    write_report(&args.output, "Headways", &workbook)?;
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use avenue_tools::analysis::outliers::{build_outlier_workbook, read_export_folder};
use avenue_tools::report::write_report;
use avenue_tools::utils::{init_logging, parse_clock_time, parse_date};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Before/after travel time summary with outliers",
    long_about = "Before/after travel time summary with outliers.\n\n\
        Reads every ClearGuide CSV export (local_datetime, avg_travel_time) in a folder, labels\n\
        rows before or after the implementation date, scores each row against its hourly\n\
        average, and writes raw data, a peak-period summary and the |z| > 3 outliers.\n\n\
        Examples:\n  \
        travel_time_tool --folder exports/ --implementation-date 2024-09-01\n  \
        travel_time_tool --folder exports/ --implementation-date 09/01/2024 --peak-start 16:00 --peak-stop 18:00"
)]
struct Args {
    /// Folder of ClearGuide CSV exports
    #[arg(short, long)]
    folder: PathBuf,

    /// First day of the "after" period
    #[arg(short, long)]
    implementation_date: String,

    /// Start of the peak period (e.g. 07:00 or 7:00 AM)
    #[arg(long, default_value = "07:00")]
    peak_start: String,

    /// End of the peak period, inclusive
    #[arg(long, default_value = "09:00")]
    peak_stop: String,

    /// Output folder for the report
    #[arg(short, long, default_value = "travel_time_report")]
    output: PathBuf,
}

fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();

    let implementation_date = parse_date(&args.implementation_date, "implementation-date")?;
    let peak_start = parse_clock_time(&args.peak_start)?;
    let peak_stop = parse_clock_time(&args.peak_stop)?;

    let samples = read_export_folder(&args.folder)?;
    info!("📂 {} travel time samples loaded", samples.len());

    let workbook = build_outlier_workbook(&samples, implementation_date, peak_start, peak_stop)?;
    write_report(&args.output, "Travel Time Summary", &workbook)?;
    Ok(())
}

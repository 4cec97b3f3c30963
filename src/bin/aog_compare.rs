use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use avenue_tools::analysis::signal::{average_aog, compare_aog};
use avenue_tools::database::DatabaseManager;
use avenue_tools::models::Config;
use avenue_tools::report::{write_report, Sheet, Workbook};
use avenue_tools::utils::{init_logging, parse_date, validate_date_range};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compare arrivals on green between two date windows",
    long_about = "Compare arrivals on green between two date windows.\n\n\
        Uses PCD plans stored by atspm_pcd. Percent arrivals on green is averaged per location\n\
        and phase in each window; phases present in both windows are compared as w2 - w1.\n\n\
        Examples:\n  \
        aog_compare --w1-start 2024-08-01 --w1-end 2024-08-31 --w2-start 2024-10-01 --w2-end 2024-10-31"
)]
struct Args {
    #[arg(long)]
    w1_start: String,

    #[arg(long)]
    w1_end: String,

    #[arg(long)]
    w2_start: String,

    #[arg(long)]
    w2_end: String,

    /// Output folder for the report
    #[arg(short, long, default_value = "aog_comparison")]
    output: PathBuf,
}

fn window_bounds(start: &str, end: &str, label: &str) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let range = validate_date_range(parse_date(start, label)?, parse_date(end, label)?)?;
    let from = range.start.and_hms_opt(0, 0, 0).ok_or_else(|| anyhow!("bad {} start", label))?;
    let to = range.end.and_hms_opt(23, 59, 59).ok_or_else(|| anyhow!("bad {} end", label))?;
    Ok((from, to))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let (w1_from, w1_to) = window_bounds(&args.w1_start, &args.w1_end, "w1")?;
    let (w2_from, w2_to) = window_bounds(&args.w2_start, &args.w2_end, "w2")?;

    let database = DatabaseManager::new(&config.database_path).await?;
    let window1 = average_aog(&database.get_pcd_plans_between(w1_from, w1_to).await?);
    let window2 = average_aog(&database.get_pcd_plans_between(w2_from, w2_to).await?);
    let comparison = compare_aog(&window1, &window2);
    info!(
        "🟢 {} phases in window 1, {} in window 2, {} compared",
        window1.len(),
        window2.len(),
        comparison.len()
    );

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records("Window 1", &window1)?)
        .add_sheet(Sheet::from_records("Window 2", &window2)?)
        .add_sheet(Sheet::from_records("Comparison", &comparison)?);
    write_report(&args.output, "Arrival on Green Comparison", &workbook)?;
    Ok(())
}

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use avenue_tools::analysis::signal::{plan_volumes, split_view};
use avenue_tools::database::DatabaseManager;
use avenue_tools::models::Config;
use avenue_tools::report::{fmt_cell, write_report, Sheet, Workbook};
use avenue_tools::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Per-plan split, split failure and volume report for one intersection",
    long_about = "Per-plan split, split failure and volume report for one intersection.\n\n\
        Averages stored split monitor data per phase for the plan, joins average percent split\n\
        failures per approach (overlaps excluded), and expresses each split as a share of the\n\
        cycle. PCD plan volumes for the location are included when available.\n\n\
        Examples:\n  \
        split_analysis --location 7610 --plan 1\n  \
        split_analysis --location 7610 --plan 254 -o splits_7610_free"
)]
struct Args {
    #[arg(short, long)]
    location: String,

    #[arg(short, long)]
    plan: String,

    /// Output folder for the report
    #[arg(short, long, default_value = "split_analysis")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;
    let database = DatabaseManager::new(&config.database_path).await?;

    let monitor = database.get_split_monitor_plans(&args.location, &args.plan).await?;
    let fails = database.get_split_fail_plans(&args.location, &args.plan).await?;
    let view = split_view(&monitor, &fails).ok_or_else(|| {
        anyhow!(
            "No split monitor data for location {} plan {}; run atspm_split_monitor first",
            args.location,
            args.plan
        )
    })?;

    let mut summary = Sheet::new("Summary", vec!["field".into(), "value".into()]);
    summary.push_row(vec!["location".into(), view.location_identifier.clone()]);
    summary.push_row(vec!["plan".into(), view.plan_number.clone()]);
    summary.push_row(vec!["cycle_length".into(), fmt_cell(view.cycle_length)]);
    summary.push_row(vec!["time_of_day".into(), view.time_of_day.join(", ")]);

    let plans = database.get_pcd_plans(Some(&args.location)).await?;
    let volumes = database.get_volume_per_hour(Some(&args.location)).await?;
    let plan_totals: Vec<_> = plan_volumes(&plans, &volumes)
        .into_iter()
        .filter(|p| p.plan_number == args.plan)
        .collect();

    info!(
        "🚦 Location {} plan {}: {} phase rows, cycle {}",
        view.location_identifier,
        view.plan_number,
        view.phases.len(),
        fmt_cell(view.cycle_length)
    );

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(summary)
        .add_sheet(Sheet::from_records("Splits", &view.phases)?)
        .add_sheet(Sheet::from_records("Plan Volumes", &plan_totals)?);
    write_report(
        &args.output,
        &format!("Splits for {} plan {}", view.location_identifier, view.plan_number),
        &workbook,
    )?;
    Ok(())
}

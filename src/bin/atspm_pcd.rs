use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use avenue_tools::api::{AtspmClient, DiagnosticsLog};
use avenue_tools::data_collector::{read_signal_ids, AtspmReport, DataCollector};
use avenue_tools::database::DatabaseManager;
use avenue_tools::models::Config;
use avenue_tools::utils::{init_logging, parse_date, validate_date_range};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Collect ATSPM Purdue coordination diagram reports",
    long_about = "Collect ATSPM Purdue coordination diagram reports into pcd_phases, pcd_plans and pcd_volume_per_hour.\n\n\
        Locations are requested one day at a time. Re-running a day replaces what was stored\n\
        for it. Responses that are not valid JSON are logged to the error log and skipped.\n\n\
        Examples:\n  \
        atspm_pcd --start 2024-10-01 --end 2024-10-07 --location 7610\n  \
        atspm_pcd --start 2024-10-01 --end 2024-10-31 --signals signals.csv"
)]
struct Args {
    /// First day (YYYY-MM-DD, YYYYMMDD or MM/DD/YYYY)
    #[arg(short, long)]
    start: String,

    /// Last day, inclusive
    #[arg(short, long)]
    end: String,

    /// Location identifier; repeat for several
    #[arg(short, long)]
    location: Vec<String>,

    /// CSV with a Signal_ID column
    #[arg(long)]
    signals: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let range = validate_date_range(parse_date(&args.start, "start")?, parse_date(&args.end, "end")?)?;
    let mut locations = args.location.clone();
    if let Some(path) = &args.signals {
        locations.extend(read_signal_ids(path)?);
    }
    if locations.is_empty() {
        return Err(anyhow!("Provide --location or --signals"));
    }

    let database = Arc::new(DatabaseManager::new(&config.database_path).await?);
    let collector = DataCollector::new(
        Arc::new(AtspmClient::new(&config)?),
        Arc::clone(&database),
        Arc::new(DiagnosticsLog::from_config(&config)),
    );

    let summary = collector
        .collect_report(AtspmReport::PurdueCoordination, &locations, range)
        .await?;

    info!(
        "🎉 {} requests: {} phases stored, {} skipped, {} failed",
        summary.requests, summary.phases_stored, summary.skipped, summary.failed
    );
    Ok(())
}

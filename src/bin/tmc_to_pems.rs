use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use avenue_tools::analysis::volumes::{read_station_rules, tmc_rollup_workbook};
use avenue_tools::database::DatabaseManager;
use avenue_tools::models::Config;
use avenue_tools::report::write_report;
use avenue_tools::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Reshape stored TMC counts into PeMS-style volume tables",
    long_about = "Reshape stored TMC counts into PeMS-style volume tables.\n\n\
        Each TMC row is assigned a station direction by the first matching rule in the station\n\
        map (columns direction, movement, station_direction; movement '*' matches any). Volumes\n\
        are summed per station and hour, then rolled up to daily and monthly averages.\n\n\
        Examples:\n  \
        tmc_to_pems --station-map station_map.csv\n  \
        tmc_to_pems --station-map station_map.csv --intersection 6226 -o tmc_6226"
)]
struct Args {
    /// Direction/movement to station direction map
    #[arg(long)]
    station_map: PathBuf,

    /// Limit to one intersection
    #[arg(short, long)]
    intersection: Option<String>,

    /// Output folder for the report
    #[arg(short, long, default_value = "tmc_pems")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let rules = read_station_rules(&args.station_map)?;
    let database = DatabaseManager::new(&config.database_path).await?;
    let records = database.get_tmc_records(args.intersection.as_deref()).await?;
    if records.is_empty() {
        return Err(anyhow!("No TMC rows stored; run atspm_tmc first"));
    }
    info!("📊 {} TMC rows loaded", records.len());

    let workbook = tmc_rollup_workbook(&records, &rules)?;
    write_report(&args.output, "TMC Volumes", &workbook)?;
    Ok(())
}

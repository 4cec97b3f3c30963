use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use avenue_tools::api::PemsClient;
use avenue_tools::models::Config;
use avenue_tools::utils::{init_logging, parse_date, validate_date_range};

#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "stationID")]
    station_id: String,
}

fn read_stations(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut stations = Vec::new();
    for row in reader.deserialize::<StationRow>() {
        stations.push(row?.station_id);
    }
    Ok(stations)
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Download PeMS station exports",
    long_about = "Download PeMS detector health exports as tab-separated text.\n\n\
        Requests are split into windows by granularity (sec: 1 day, 5min: 7 days, otherwise\n\
        92 days) and saved as Mon-DD-YYYY_Mon-DD-YYYY_{gran}_{station}.tsv. Requires\n\
        PEMS_SESSION_ID from a logged-in browser session.\n\n\
        Examples:\n  \
        pems_download --station 401 --start 2024-01-01 --end 2024-03-31 --granularity hour\n  \
        pems_download --stations stations.csv --start 2024-01-01 --end 2024-01-14 -o pems/"
)]
struct Args {
    /// Station id; repeat for several
    #[arg(long)]
    station: Vec<String>,

    /// CSV with a stationID column
    #[arg(long)]
    stations: Option<PathBuf>,

    #[arg(short, long)]
    start: String,

    #[arg(short, long)]
    end: String,

    /// sec, 5min, hour, ...
    #[arg(short, long, default_value = "5min")]
    granularity: String,

    /// Second measure alongside flow
    #[arg(long, default_value = "speed")]
    q2: String,

    /// Output folder
    #[arg(short, long, default_value = "pems")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let range = validate_date_range(parse_date(&args.start, "start")?, parse_date(&args.end, "end")?)?;
    let mut stations = args.station.clone();
    if let Some(path) = &args.stations {
        stations.extend(read_stations(path)?);
    }
    if stations.is_empty() {
        return Err(anyhow!("Provide --station or --stations"));
    }

    let client = PemsClient::new(&config)?;
    let mut files = 0;
    let mut failed = 0;
    for station in &stations {
        match client
            .download_station(station, range, &args.granularity, &args.q2, &args.output)
            .await
        {
            Ok(paths) => files += paths.len(),
            Err(e) => {
                failed += 1;
                error!("❌ Station {}: {:#}", station, e);
            }
        }
    }

    info!("🎉 {} files written, {} stations failed", files, failed);
    Ok(())
}

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use avenue_tools::api::ClearGuideClient;
use avenue_tools::models::clearguide::DataDownloadRequest;
use avenue_tools::models::Config;
use avenue_tools::utils::{init_logging, parse_date};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Request and save a daily ClearGuide bulk download",
    long_about = "Request and save a daily ClearGuide bulk download.\n\n\
        Creates a 5-minute statewide download for one UTC day (yesterday by default), waits\n\
        for it to generate, then saves it as '{name}.csv.gz'. Generation can take an hour\n\
        or more.\n\n\
        Examples:\n  \
        clearguide_download --folder downloads/\n  \
        clearguide_download --date 2024-10-19 --geography state:ut --folder downloads/"
)]
struct Args {
    /// Day to download; defaults to yesterday (UTC)
    #[arg(short, long)]
    date: Option<String>,

    /// Geography code
    #[arg(short, long, default_value = "state:ut")]
    geography: String,

    /// Folder for the downloaded file
    #[arg(short, long, default_value = "downloads")]
    folder: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let day: NaiveDate = match &args.date {
        Some(d) => parse_date(d, "date")?,
        None => Utc::now().date_naive() - Duration::days(1),
    };
    let day_start = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid day {}", day))?
        .and_utc()
        .timestamp();

    let name = format!("UT Download {}", day.format("%Y-%m-%d"));
    let request = DataDownloadRequest::daily(&name, day_start, &args.geography, config.local_timezone.name());

    let client = ClearGuideClient::new(&config)?;
    let download_id = client.create_download(&request).await?;
    info!("🆔 Download ID: {}", download_id);

    let path = client.download(download_id, &name, &args.folder).await?;
    info!("🎉 Saved {}", path.display());
    Ok(())
}

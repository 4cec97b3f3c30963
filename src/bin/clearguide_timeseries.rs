use anyhow::Result;
use clap::Parser;
use tracing::info;

use avenue_tools::api::ClearGuideClient;
use avenue_tools::data_collector::collect_route_speeds;
use avenue_tools::database::DatabaseManager;
use avenue_tools::models::Config;
use avenue_tools::utils::{init_logging, local_day_bounds, parse_date, validate_date_range};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Store ClearGuide route average speeds",
    long_about = "Store ClearGuide route average speeds in the clearguide_avg_speed table.\n\n\
        Dates are local days in LOCAL_TIMEZONE. Samples already stored for a route and\n\
        timestamp are replaced.\n\n\
        Examples:\n  \
        clearguide_timeseries --route 9946 --route 9947 --start 2024-09-20 --end 2024-09-21\n  \
        clearguide_timeseries --route 13236 --start 2024-08-01 --end 2024-08-31 --granularity hour"
)]
struct Args {
    /// Customer route number; repeat for several
    #[arg(short, long, required = true)]
    route: Vec<i64>,

    /// First local day
    #[arg(short, long)]
    start: String,

    /// Last local day, inclusive
    #[arg(short, long)]
    end: String,

    /// ClearGuide granularity
    #[arg(short, long, default_value = "5min")]
    granularity: String,

    /// Leave holidays out of the series
    #[arg(long)]
    exclude_holidays: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let range = validate_date_range(parse_date(&args.start, "start")?, parse_date(&args.end, "end")?)?;
    let (s_timestamp, e_timestamp) = local_day_bounds(range, config.local_timezone)?;

    let database = DatabaseManager::new(&config.database_path).await?;
    let client = ClearGuideClient::new(&config)?;

    info!("🚗 Fetching {} routes, {} to {}", args.route.len(), range.start, range.end);
    let stored = collect_route_speeds(
        &client,
        &database,
        &args.route,
        s_timestamp,
        e_timestamp,
        &args.granularity,
        !args.exclude_holidays,
    )
    .await?;

    info!("🎉 {} speed samples stored", stored);
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use avenue_tools::analysis::signal::dedupe_tmc;
use avenue_tools::database::DatabaseManager;
use avenue_tools::models::Config;
use avenue_tools::report::write_csv;
use avenue_tools::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Report duplicate TMC rows",
    long_about = "Report duplicate TMC rows.\n\n\
        Rows identical on intersection, date, time, direction, movement and volume are\n\
        duplicates. Every row of a duplicated group is written to the duplicates CSV; the\n\
        first occurrence of each row is written to the deduplicated CSV.\n\n\
        Examples:\n  \
        tmc_dedupe\n  \
        tmc_dedupe --intersection 6226 --duplicates dup_6226.csv --deduplicated tmc_6226.csv"
)]
struct Args {
    /// Limit to one intersection
    #[arg(short, long)]
    intersection: Option<String>,

    #[arg(long, default_value = "tmc_duplicates.csv")]
    duplicates: PathBuf,

    #[arg(long, default_value = "tmc_deduplicated.csv")]
    deduplicated: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let database = DatabaseManager::new(&config.database_path).await?;
    let records = database.get_tmc_records(args.intersection.as_deref()).await?;
    let result = dedupe_tmc(&records);

    if result.duplicated.is_empty() {
        info!("✅ No duplicates in {} TMC rows", records.len());
    } else {
        warn!(
            "⚠️  {} rows belong to duplicated groups; {} of {} rows kept",
            result.duplicated.len(),
            result.kept.len(),
            records.len()
        );
    }

    write_csv(&args.duplicates, &result.duplicated)?;
    write_csv(&args.deduplicated, &result.kept)?;
    Ok(())
}

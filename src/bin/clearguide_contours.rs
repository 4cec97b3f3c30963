//! Before/after speed contours for ClearGuide routes

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use avenue_tools::analysis::contours::{
    compare_windows, flatten_contours, intersection_distances, prepare_cells, RouteDirection,
};
use avenue_tools::api::clearguide_client::RouteQuery;
use avenue_tools::api::ClearGuideClient;
use avenue_tools::models::Config;
use avenue_tools::parsers::read_placemarks;
use avenue_tools::report::{write_report, Sheet, Workbook};
use avenue_tools::utils::{init_logging, local_day_bounds, parse_date, validate_date_range};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compare ClearGuide speed contours between two date windows",
    long_about = "Compare ClearGuide speed contours between two date windows.\n\n\
        Hourly contours are pulled for each route over both windows. Friday through Sunday are\n\
        dropped, speeds are averaged per route, hour and distance (to 0.01 mi), and the two\n\
        windows are outer-joined with after - before as the difference. Intersection markers,\n\
        when given, are reported as distances from the start of the route.\n\n\
        Examples:\n  \
        clearguide_contours --route 9946 --route 9947 --before-start 2024-08-01 --before-end 2024-08-21 \\\n    \
        --after-start 2024-09-19 --after-end 2024-10-13 --markers state_st.kml --direction northbound"
)]
struct Args {
    /// Customer route number; repeat for several
    #[arg(short, long, required = true)]
    route: Vec<i64>,

    #[arg(long)]
    before_start: String,

    #[arg(long)]
    before_end: String,

    #[arg(long)]
    after_start: String,

    #[arg(long)]
    after_end: String,

    /// Intersection markers (.kml or .kmz) for the distance axis
    #[arg(long)]
    markers: Option<PathBuf>,

    /// Direction used to pick the starting intersection
    #[arg(long, value_enum, default_value = "northbound")]
    direction: RouteDirection,

    /// Output folder for the report
    #[arg(short, long, default_value = "contours")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("avenue_tools=info");
    let args = Args::parse();
    let config = Config::from_env()?;

    let before = validate_date_range(
        parse_date(&args.before_start, "before-start")?,
        parse_date(&args.before_end, "before-end")?,
    )?;
    let after = validate_date_range(
        parse_date(&args.after_start, "after-start")?,
        parse_date(&args.after_end, "after-end")?,
    )?;

    let download_range = validate_date_range(before.start.min(after.start), before.end.max(after.end))?;
    let (s_timestamp, e_timestamp) = local_day_bounds(download_range, config.local_timezone)?;

    let client = ClearGuideClient::new(&config)?;
    let mut readings = Vec::new();
    for &route_id in &args.route {
        let query = RouteQuery {
            route_id,
            s_timestamp,
            e_timestamp,
            granularity: "hour".to_string(),
            include_holidays: false,
        };
        let points = client.contours(&query).await?;
        let flattened = flatten_contours(route_id, points);
        info!("📈 Route {}: {} contour cells", route_id, flattened.len());
        readings.extend(flattened);
    }

    let cells = prepare_cells(&readings, config.local_timezone);
    let changes = compare_windows(&cells, before, after);

    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::from_records("Contours Raw", &readings)?)
        .add_sheet(Sheet::from_records("Speed Changes", &changes)?);

    if let Some(markers) = &args.markers {
        let placemarks = read_placemarks(markers)?;
        let mut distances = Sheet::new("Intersections", vec!["intersection".into(), "distance_miles".into()]);
        for (name, miles) in intersection_distances(&placemarks, args.direction) {
            distances.push_row(vec![name, format!("{:.2}", miles)]);
        }
        workbook.add_sheet(distances);
    }

    write_report(&args.output, "Speed Contour Comparison", &workbook)?;
    info!("🎉 {} before/after cells compared", changes.len());
    Ok(())
}

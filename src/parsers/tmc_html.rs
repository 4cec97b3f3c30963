//! ATSPM turning movement count table parser

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::error::{ToolError, ToolResult};
use crate::models::TmcRecord;

pub const DIRECTIONS: [&str; 4] = ["Eastbound", "Westbound", "Northbound", "Southbound"];
pub const MOVEMENTS: [&str; 3] = ["L", "T", "R"];

/// Header rows above the first time bin
const HEADER_ROWS: usize = 3;

static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.table.table-bordered.table-striped.table-condensed")
        .expect("selector should parse")
});
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("selector should parse"));
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("selector should parse"));

/// Rows recovered from one TMC page plus the gaps noticed along the way
#[derive(Debug, Default)]
pub struct ParsedTmc {
    pub records: Vec<TmcRecord>,
    pub warnings: Vec<String>,
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse the TMC data table.
///
/// Each data row is `time, [L, T, R, total] x 4 directions`. Movements that
/// do not exist at an intersection are rendered as cells with a `class`
/// attribute (or are absent); those are reported as warnings and do not
/// consume a column.
pub fn parse_tmc_table(html: &str, intersection_id: &str, date: NaiveDate) -> ToolResult<ParsedTmc> {
    let document = Html::parse_document(html);
    let table = document.select(&TABLE_SELECTOR).next().ok_or_else(|| {
        let preview: String = html.chars().take(200).collect();
        ToolError::malformed(
            "TMC page",
            format!(
                "no table found for intersection {} on {}. Response content: {}...",
                intersection_id, date, preview
            ),
        )
    })?;

    let rows: Vec<ElementRef<'_>> = table.select(&ROW_SELECTOR).skip(HEADER_ROWS).collect();
    let data_rows = match rows.split_last() {
        Some((_total, rest)) => rest,
        None => &[],
    };

    let mut parsed = ParsedTmc::default();
    for row in data_rows {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL_SELECTOR).collect();
        let Some(first) = cells.first() else {
            continue;
        };
        let time = cell_text(first);

        let mut cell_index = 1;
        for direction in DIRECTIONS {
            for movement in MOVEMENTS {
                let cell = cells
                    .get(cell_index)
                    .filter(|c| c.value().attr("class").is_none());

                match cell {
                    Some(cell) => {
                        let text = cell_text(cell);
                        match text.parse::<i64>() {
                            Ok(volume) => parsed.records.push(TmcRecord {
                                intersection_id: intersection_id.to_string(),
                                date,
                                time: time.clone(),
                                direction: direction.to_string(),
                                movement: movement.to_string(),
                                volume,
                            }),
                            Err(_) => parsed.warnings.push(format!(
                                "Warning: Non-numeric volume '{}' for {} {} at {} for intersection {} on {}",
                                text, direction, movement, time, intersection_id, date
                            )),
                        }
                        cell_index += 1;
                    }
                    None => parsed.warnings.push(format!(
                        "Warning: Missing data for {} {} at {} for intersection {} on {}",
                        direction, movement, time, intersection_id, date
                    )),
                }
            }
            // total column for the direction
            cell_index += 1;
        }
    }

    Ok(parsed)
}

//! Tabular report writers
//!
//! Reports are written as plain CSV. A multi-sheet report ("workbook") becomes
//! a directory holding one CSV per sheet, and can also be rendered as a single
//! HTML page.

use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod html;

pub use html::{render_workbook_html, write_report, write_workbook_html};

/// One named table with dynamic columns
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: &str, headers: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Build a sheet from serializable records, using the serde field names as headers
    pub fn from_records<T: Serialize>(name: &str, records: &[T]) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            writer.serialize(record)?;
        }
        let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("CSV buffer error: {}", e))?;

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = if records.is_empty() {
            Vec::new()
        } else {
            reader.headers()?.iter().map(str::to_string).collect()
        };
        let mut sheet = Sheet::new(name, headers);
        for row in reader.records() {
            sheet.push_row(row?.iter().map(str::to_string).collect());
        }
        Ok(sheet)
    }

    /// File-system friendly sheet name
    pub fn file_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{}.csv", cleaned.trim_matches('_'))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        if !self.headers.is_empty() {
            writer.write_record(&self.headers)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Ordered collection of sheets written together
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) -> &mut Self {
        self.sheets.push(sheet);
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Write every sheet to `{dir}/{sheet}.csv`
    pub fn write_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.sheets.len());
        for sheet in &self.sheets {
            let path = dir.join(sheet.file_name());
            sheet.write_csv(&path)?;
            written.push(path);
        }
        info!("💾 Wrote {} sheets to {}", written.len(), dir.display());
        Ok(written)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write serializable rows to a CSV file with a header line
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("💾 Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Format an optional number for a report cell; missing values are blank
pub fn fmt_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{}", v as i64)
            } else {
                format!("{:.3}", v)
            }
        }
        _ => String::new(),
    }
}

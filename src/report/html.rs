use anyhow::Result;
use askama::Template;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{Sheet, Workbook};

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; margin-bottom: 2em; }
th, td { border: 1px solid #bbb; padding: 4px 8px; text-align: right; }
th { background: #eee; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<p>Generated {{ generated }}</p>
{% for sheet in sheets %}
<h2>{{ sheet.name }}</h2>
<table>
<tr>{% for header in sheet.headers %}<th>{{ header }}</th>{% endfor %}</tr>
{% for row in sheet.rows %}<tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
{% endfor %}
</table>
{% endfor %}
</body>
</html>"#
)]
struct WorkbookPage<'a> {
    title: &'a str,
    generated: String,
    sheets: &'a [Sheet],
}

/// Render every sheet of a workbook into one HTML page
pub fn render_workbook_html(title: &str, workbook: &Workbook) -> Result<String> {
    let page = WorkbookPage {
        title,
        generated: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        sheets: &workbook.sheets,
    };
    Ok(page.render()?)
}

pub fn write_workbook_html(path: &Path, title: &str, workbook: &Workbook) -> Result<()> {
    let html = render_workbook_html(title, workbook)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

/// Write every sheet as CSV plus an `index.html` overview into `dir`
pub fn write_report(dir: &Path, title: &str, workbook: &Workbook) -> Result<PathBuf> {
    workbook.write_dir(dir)?;
    let index = dir.join("index.html");
    write_workbook_html(&index, title, workbook)?;
    info!("📄 Report written to {}", index.display());
    Ok(index)
}

use thiserror::Error;

/// Parse and data-shape failures raised by the file readers and transforms.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("could not parse timestamp '{0}'")]
    BadTimestamp(String),

    #[error("could not parse date '{value}': {reason}")]
    BadDate { value: String, reason: String },

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("malformed {format}: {detail}")]
    Malformed { format: &'static str, detail: String },

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("no data: {0}")]
    Empty(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl ToolError {
    pub fn missing_column(column: &str, source_name: &str) -> Self {
        ToolError::MissingColumn {
            column: column.to_string(),
            source_name: source_name.to_string(),
        }
    }

    pub fn malformed(format: &'static str, detail: impl Into<String>) -> Self {
        ToolError::Malformed { format, detail: detail.into() }
    }
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;

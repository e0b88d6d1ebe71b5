//! Error types for loading, normalizing and exporting province tables.

use std::path::PathBuf;

/// Errors surfaced to the caller.
///
/// Data-shape problems that only affect one column or one date (malformed
/// column names, missing metric columns) are not errors: they are skipped,
/// logged and listed in the relevant report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when an input or output file cannot be opened.
    #[error("cannot access {path}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser or writer fails.
    #[error("CSV error")]
    Csv(#[from] csv::Error),

    /// Returned when a spreadsheet cannot be opened or read.
    #[error("spreadsheet error in {path}")]
    Spreadsheet {
        path: PathBuf,
        source: calamine::Error,
    },

    /// Returned when a workbook has no worksheets.
    #[error("workbook {path} has no worksheets")]
    EmptyWorkbook { path: PathBuf },

    /// Returned when a column the operation depends on is absent.
    #[error("column \"{column}\" not found")]
    MissingColumn { column: String },

    /// Returned when unmapped entity names are configured to be fatal.
    #[error("no canonical name for: {}", names.join(", "))]
    UnmappedEntities { names: Vec<String> },

    /// Returned when the TOML configuration cannot be parsed.
    #[error("invalid configuration")]
    Config(#[from] toml::de::Error),

    /// Returned when there is nothing to draw.
    #[error("nothing to plot")]
    EmptyPlot,

    /// Returned when the chart backend fails.
    #[error("chart rendering failed: {0}")]
    Chart(String),
}

pub type Result<T> = std::result::Result<T, Error>;

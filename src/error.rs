//! Error taxonomy for the report pipeline.
//!
//! Only conditions that must abort a run live here. Empty series, boundary
//! values and dropped join keys degrade into the output and are recorded in
//! [`Audit`](crate::analyzers::types::Audit) instead.

use thiserror::Error;

use crate::analyzers::types::KeyShape;

#[derive(Debug, Error)]
pub enum ReportError {
    /// A required column is missing or holds a value of the wrong type.
    #[error("series '{series}': column '{column}': {reason}")]
    Schema {
        series: String,
        column: String,
        reason: String,
    },

    /// Merge inputs were aggregated with different grouping keys.
    #[error("series '{series}' is keyed by {found:?}, expected {expected:?}")]
    KeyShapeMismatch {
        series: String,
        expected: KeyShape,
        found: KeyShape,
    },

    /// An aggregate row does not carry one value per declared column.
    #[error("series '{series}' declares {expected} columns but a row holds {found} values")]
    RowWidthMismatch {
        series: String,
        expected: usize,
        found: usize,
    },

    #[error("{found} series payloads supplied for {expected} configured series")]
    SeriesCountMismatch { expected: usize, found: usize },

    #[error("malformed CSV payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

impl ReportError {
    pub fn missing_column(series: &str, column: &str) -> Self {
        ReportError::Schema {
            series: series.to_string(),
            column: column.to_string(),
            reason: "column is missing".to_string(),
        }
    }

    pub fn invalid_value(series: &str, column: &str, value: &str) -> Self {
        ReportError::Schema {
            series: series.to_string(),
            column: column.to_string(),
            reason: format!("cannot interpret '{value}'"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

use thiserror::Error;

/// Failures a caller can recover from by choosing different inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StudioError {
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    #[error("Column '{0}' already exists")]
    ColumnExists(String),
    #[error("Column '{column}' has a {expected} filter and cannot take a {requested} filter")]
    FilterKindMismatch {
        column: String,
        expected: &'static str,
        requested: &'static str,
    },
    #[error("Value '{value}' is not a valid {expected} for column '{column}'")]
    InvalidFilterValue {
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("Chart '{0}' not found")]
    UnknownChart(String),
    #[error("Page size must be greater than zero")]
    InvalidPageSize,
}

// 🚫 Error taxonomy
// Validation failures are rejected batches, storage failures propagate as-is

use chrono::NaiveDate;
use thiserror::Error;

/// A single plan row that cannot be accepted.
///
/// `line` is the 1-based data row in the uploaded table (header excluded).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("row {line}: invalid period '{value}'")]
    InvalidPeriod { line: usize, value: String },

    #[error("row {line}: period must be first of month, got {period}")]
    PeriodNotFirstOfMonth { line: usize, period: NaiveDate },

    #[error("row {line}: missing sum")]
    MissingSum { line: usize },

    #[error("row {line}: invalid sum '{value}'")]
    InvalidSum { line: usize, value: String },

    #[error("row {line}: unknown category '{name}'")]
    UnknownCategory { line: usize, name: String },

    #[error("row {line}: duplicate plan for {period} and category '{category}'")]
    DuplicatePlan {
        line: usize,
        period: NaiveDate,
        category: String,
    },
}

impl ValidationError {
    pub fn line(&self) -> usize {
        match self {
            ValidationError::InvalidPeriod { line, .. }
            | ValidationError::PeriodNotFirstOfMonth { line, .. }
            | ValidationError::MissingSum { line }
            | ValidationError::InvalidSum { line, .. }
            | ValidationError::UnknownCategory { line, .. }
            | ValidationError::DuplicatePlan { line, .. } => *line,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unsupported file '{0}': expected .xlsx, .csv or .tsv")]
    UnsupportedFile(String),

    #[error("file must contain the columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("malformed table: {0}")]
    MalformedTable(String),

    #[error("year {0} is out of the supported calendar range")]
    InvalidYear(i32),

    #[error("bad seed data in {file} line {line}: {message}")]
    Seed {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::UnsupportedFile(_)
                | Error::MissingColumns(_)
                | Error::MalformedTable(_)
                | Error::InvalidYear(_)
        )
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::MalformedTable(err.to_string())
    }
}

impl From<calamine::XlsxError> for Error {
    fn from(err: calamine::XlsxError) -> Self {
        Error::MalformedTable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

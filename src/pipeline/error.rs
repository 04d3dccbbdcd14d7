//! Error taxonomy for loading and analysing the marketplace tables

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, cleaning or analysing the dataset.
///
/// The variants are cloneable so a failed table can be reported by every
/// page that depends on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("missing data file for '{dataset}': {}", path.display())]
    MissingFile { dataset: String, path: PathBuf },

    #[error("dataset '{dataset}' is missing required column '{column}'")]
    Schema { dataset: String, column: String },

    #[error("dataset '{dataset}' contains no rows")]
    EmptyTable { dataset: String },

    #[error("failed to parse '{dataset}': {message}")]
    Parse { dataset: String, message: String },

    #[error("no rows left for {context}")]
    EmptyResult { context: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl DataError {
    pub fn parse(dataset: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DataError::Parse {
            dataset: dataset.into(),
            message: err.to_string(),
        }
    }

    pub fn empty_result(context: impl Into<String>) -> Self {
        DataError::EmptyResult {
            context: context.into(),
        }
    }
}

pub type DataResult<T> = Result<T, DataError>;

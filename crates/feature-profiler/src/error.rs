//! Profiling Error Types

use thiserror::Error;

/// Errors raised while loading or profiling a dataset
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The dataset has no `EVENT_LABEL` column
    #[error("Dataset is missing the required {0} column")]
    MissingLabel(&'static str),

    /// The dataset has zero rows, so ratios are undefined
    #[error("Dataset is empty: no rows to profile")]
    EmptyDataset,

    /// The label column does not hold exactly two distinct values
    #[error("Event label must be binary, found {distinct} distinct values: {values:?}")]
    NonBinaryLabel { distinct: usize, values: Vec<String> },

    /// Both label values occur equally often
    #[error("Cannot map labels: '{first}' and '{second}' both occur {count} times")]
    TiedLabelFrequency {
        first: String,
        second: String,
        count: usize,
    },

    /// Columns of unequal length or duplicate names
    #[error("Invalid dataset shape: {0}")]
    InvalidShape(String),

    /// A name pattern in the profiler configuration does not compile
    #[error("Invalid {field} pattern: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    /// CSV decoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File access failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

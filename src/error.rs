use thiserror::Error;

use crate::types::ColumnRole;

/// Convenience result type for parsing and reshaping operations.
pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// Error type returned by the parsing, classification, reshaping and coercion stages.
///
/// There is no partial output: a stage either returns its full result or one of these errors.
#[derive(Debug, Error)]
pub enum ReshapeError {
    /// Underlying I/O error while reading an export from disk.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level delimited-text error from the CSV reader.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The raw text is empty or does not have the expected shape.
    #[error("format error: {message}")]
    Format { message: String },

    /// Two dialect rules assign different roles to the same header.
    ///
    /// This indicates a defect in a naming dictionary, not bad input.
    #[error("ambiguous column '{header}': classified as both {first:?} and {second:?}")]
    Ambiguity {
        header: String,
        first: ColumnRole,
        second: ColumnRole,
    },

    /// A structural guarantee of the wire format was violated (e.g. a block that must precede
    /// another block is missing).
    #[error("invariant violated: {message}")]
    Invariant { message: String },

    /// Two observations of the same group claim the same output column.
    #[error("pivot conflict in group [{group}] for column '{column}'")]
    PivotConflict { group: String, column: String },

    /// A value could not be coerced into the column's numeric type.
    #[error("failed to coerce column '{column}': {message} (raw='{raw}')")]
    TypeCoercion {
        column: String,
        raw: String,
        message: String,
    },

    /// No supported database matches the given item code.
    #[error("could not determine the database for '{name}'")]
    UnknownDatabase { name: String },

    /// A configuration document could not be decoded.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Conversion into a polars `DataFrame` failed.
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl ReshapeError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}

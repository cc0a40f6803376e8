//! Error types for schema inference, alignment and decomposition.
//!
//! Every failure that touches the store names the table it was working on,
//! so callers can tell which part of a decomposed record was rejected.

use thiserror::Error;

use crate::store::StoreError;
use crate::types::ColumnSpec;

/// Errors produced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Two distinct fields map to the same column name once sanitized.
    #[error("schema conflict in table '{table}': fields '{first}' and '{second}' both map to column '{column}'")]
    SchemaConflict {
        table: String,
        column: String,
        first: String,
        second: String,
    },

    /// A name is left empty after sanitization.
    #[error("invalid identifier '{raw}' for table '{table}': no alphanumeric characters remain")]
    InvalidIdentifier { table: String, raw: String },

    /// Input could not be turned into a record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A create-table or add-column DDL failed.
    ///
    /// Columns in `applied` were added before the failure and stay in place.
    /// `failed` holds the columns that were not added, the one whose DDL
    /// failed first. A failed create has nothing applied and every desired
    /// column in `failed`.
    #[error("alignment of table '{table}' failed with {} column(s) not added after {} applied: {source}", .failed.len(), .applied.len())]
    AlignmentFailed {
        table: String,
        applied: Vec<ColumnSpec>,
        failed: Vec<ColumnSpec>,
        #[source]
        source: StoreError,
    },

    /// List nesting under `field` went deeper than the configured bound.
    #[error("decomposition of table '{table}' exceeded max depth {max_depth} at field '{field}'")]
    DecompositionDepthExceeded {
        table: String,
        field: String,
        max_depth: usize,
    },

    /// The store could not answer a metadata query.
    #[error("store unavailable for table '{table}': {source}")]
    StoreUnavailable {
        table: String,
        #[source]
        source: StoreError,
    },

    /// The database behind a store could not be opened.
    #[error("failed to open store at '{path}': {source}")]
    StoreOpen {
        path: String,
        #[source]
        source: StoreError,
    },

    /// A row insert failed while writing a plan; the transaction was rolled back.
    #[error("write to table '{table}' failed: {source}")]
    WriteFailed {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The table implicated by this error, when there is one.
    pub fn table(&self) -> Option<&str> {
        match self {
            Error::SchemaConflict { table, .. }
            | Error::InvalidIdentifier { table, .. }
            | Error::AlignmentFailed { table, .. }
            | Error::DecompositionDepthExceeded { table, .. }
            | Error::StoreUnavailable { table, .. }
            | Error::WriteFailed { table, .. } => Some(table),
            Error::StoreOpen { .. } | Error::InvalidRecord(_) | Error::Json(_) | Error::Io(_) => None,
        }
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

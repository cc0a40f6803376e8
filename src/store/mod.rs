//! Table store adapters
//!
//! The engine never talks SQL directly; it reads table metadata and issues
//! DDL through [`TableStore`]. [`SqliteStore`] is the bundled implementation.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::types::{ColumnSet, ColumnSpec, Row};
use thiserror::Error;

/// Failure reported by a store adapter
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Operations the engine and its callers need from a relational store.
///
/// Implementations must report live metadata: [`columns`](Self::columns) is
/// re-read on every call because the store may change between calls.
pub trait TableStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    /// Current columns of `table`; empty if the table does not exist
    fn columns(&self, table: &str) -> Result<ColumnSet, StoreError>;

    fn create_table(&self, table: &str, columns: &ColumnSet) -> Result<(), StoreError>;

    fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<(), StoreError>;

    /// Insert one row, returning the store-assigned row id when there is one
    fn insert_row(&self, table: &str, row: &Row) -> Result<Option<i64>, StoreError>;

    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        for row in rows {
            self.insert_row(table, row)?;
        }
        Ok(rows.len())
    }

    /// All rows of `table` in insertion order
    fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    fn tables(&self) -> Result<Vec<String>, StoreError>;

    fn begin(&self) -> Result<(), StoreError>;

    fn commit(&self) -> Result<(), StoreError>;

    fn rollback(&self) -> Result<(), StoreError>;
}

//! Additive schema alignment
//!
//! Brings a table in line with a desired column set by creating it or adding
//! the columns it lacks. Columns are never dropped, renamed or retyped, so
//! rows written under an older shape survive every later alignment.
//!
//! The store is the only source of truth for a table's columns. Nothing is
//! cached: every call re-reads the live metadata while holding that table's
//! lock, so two callers cannot both see a column as missing and both add it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::naming::{sanitize_identifier, table_name};
use crate::record::Record;
use crate::schema::extract::extract_schema;
use crate::store::TableStore;
use crate::types::{ColumnSet, EngineConfig};

/// Outcome of one alignment call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentResult {
    pub table: String,
    /// The table did not exist and was created
    pub created: bool,
    /// Columns that exist now but did not before this call. For a created
    /// table this is every live column, including any the store adds itself.
    pub added_columns: ColumnSet,
}

impl AlignmentResult {
    /// True when the call issued no DDL
    pub fn is_noop(&self) -> bool {
        !self.created && self.added_columns.is_empty()
    }
}

/// One lock per table name, created on first use
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TableLocks {
    fn get(&self, table: &str) -> Arc<Mutex<()>> {
        // The maps guard no invariant beyond their own contents, so a
        // poisoned lock is still safe to use.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Creates and widens tables through an injected [`TableStore`]
pub struct SchemaAligner<S> {
    store: Arc<S>,
    locks: Arc<TableLocks>,
    config: EngineConfig,
}

impl<S> Clone for SchemaAligner<S> {
    fn clone(&self) -> Self {
        SchemaAligner {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            config: self.config.clone(),
        }
    }
}

impl<S: TableStore> SchemaAligner<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        SchemaAligner {
            store,
            locks: Arc::new(TableLocks::default()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Infer the columns of `record` and align `table` to them
    pub fn align_record(&self, table: &str, record: &Record) -> Result<AlignmentResult> {
        let table = table_name(table)?;
        let extraction = extract_schema(&table, record, &self.config)?;
        self.align(&table, &extraction.columns)
    }

    /// Ensure `table` exists and has at least the `desired` columns
    pub fn align(&self, table: &str, desired: &ColumnSet) -> Result<AlignmentResult> {
        let table = table_name(table)?;
        for name in desired.names() {
            if name.is_empty() || sanitize_identifier(name) != name {
                return Err(Error::InvalidIdentifier {
                    table: table.clone(),
                    raw: name.to_string(),
                });
            }
        }

        let lock = self.locks.get(&table);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let exists = self
            .store
            .table_exists(&table)
            .map_err(|source| Error::StoreUnavailable {
                table: table.clone(),
                source,
            })?;

        if !exists {
            if let Err(source) = self.store.create_table(&table, desired) {
                return Err(Error::AlignmentFailed {
                    table,
                    applied: Vec::new(),
                    failed: desired.iter().collect(),
                    source,
                });
            }
            // The store may add columns of its own, such as a placeholder
            // for a table created without any.
            let created = self
                .store
                .columns(&table)
                .map_err(|source| Error::StoreUnavailable {
                    table: table.clone(),
                    source,
                })?;
            info!(table = %table, columns = created.len(), "created table");
            return Ok(AlignmentResult {
                table,
                created: true,
                added_columns: created,
            });
        }

        let current = self
            .store
            .columns(&table)
            .map_err(|source| Error::StoreUnavailable {
                table: table.clone(),
                source,
            })?;

        for column in desired.iter() {
            if let Some(existing) = current.get(&column.name) {
                if existing != column.column_type {
                    debug!(
                        table = %table,
                        column = %column.name,
                        existing = existing.as_sql(),
                        observed = column.column_type.as_sql(),
                        "keeping existing column type"
                    );
                }
            }
        }

        let mut missing = desired.missing_from(&current).into_iter();
        let mut applied = Vec::new();
        while let Some(column) = missing.next() {
            if let Err(source) = self.store.add_column(&table, &column) {
                let failed = std::iter::once(column).chain(missing).collect();
                return Err(Error::AlignmentFailed {
                    table,
                    applied,
                    failed,
                    source,
                });
            }
            info!(table = %table, column = %column.name, column_type = column.column_type.as_sql(), "added column");
            applied.push(column);
        }

        if applied.is_empty() {
            debug!(table = %table, "schema already aligned");
        }

        Ok(AlignmentResult {
            table,
            created: false,
            added_columns: applied.into_iter().collect(),
        })
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::melt::plan::WritePlan;
use crate::store::TableStore;
use crate::types::Row;

/// Rows written per table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteReport {
    pub records: usize,
    pub rows_written: usize,
    pub tables: BTreeMap<String, usize>,
}

impl WriteReport {
    fn add(&mut self, table: &str, rows: usize) {
        self.rows_written += rows;
        *self.tables.entry(table.to_string()).or_insert(0) += rows;
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: WriteReport) {
        self.records += other.records;
        self.rows_written += other.rows_written;
        for (table, rows) in other.tables {
            *self.tables.entry(table).or_insert(0) += rows;
        }
    }
}

/// Writes plans to a store, one transaction per plan
pub struct PlanWriter<S> {
    store: Arc<S>,
}

impl<S> Clone for PlanWriter<S> {
    fn clone(&self) -> Self {
        PlanWriter {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: TableStore> PlanWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        PlanWriter { store }
    }

    /// Write the parent row and every child write of `plan` in one transaction
    pub fn write(&self, plan: &WritePlan) -> Result<WriteReport> {
        self.transaction(&plan.table, || self.insert_plan(plan, true))
    }

    /// Write only the child rows; for plans whose parent row is already stored
    pub fn write_children(&self, plan: &WritePlan) -> Result<WriteReport> {
        self.transaction(&plan.table, || self.insert_plan(plan, false))
    }

    /// Run `f` inside a store transaction, rolling back if it fails
    pub fn transaction<T>(&self, table: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.store.begin().map_err(|source| Error::WriteFailed {
            table: table.to_string(),
            source,
        })?;

        match f() {
            Ok(value) => {
                self.store.commit().map_err(|source| Error::WriteFailed {
                    table: table.to_string(),
                    source,
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!(table = %table, error = %rollback, "rollback failed");
                }
                let failed = err.table().unwrap_or(table);
                warn!(table = %failed, error = %err, "write rolled back");
                Err(err)
            }
        }
    }

    /// Insert a single row, returning the store-assigned row id
    pub fn insert_row(&self, table: &str, row: &Row) -> Result<Option<i64>> {
        self.store
            .insert_row(table, row)
            .map_err(|source| Error::WriteFailed {
                table: table.to_string(),
                source,
            })
    }

    /// Insert the rows of `plan` without opening a transaction
    pub fn insert_plan(&self, plan: &WritePlan, include_parent: bool) -> Result<WriteReport> {
        let mut report = WriteReport {
            records: 1,
            ..WriteReport::default()
        };

        if include_parent {
            self.insert_row(&plan.table, &plan.parent_row)?;
            report.add(&plan.table, 1);
        }

        for write in &plan.child_writes {
            let table = &write.binding.child_table;
            self.store
                .insert_rows(table, &write.rows)
                .map_err(|source| Error::WriteFailed {
                    table: table.clone(),
                    source,
                })?;
            report.add(table, write.rows.len());
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melt::decompose::Decomposer;
    use crate::record::Record;
    use crate::schema::align::SchemaAligner;
    use crate::store::SqliteStore;
    use crate::types::{Cell, EngineConfig};
    use serde_json::json;

    fn setup() -> (Decomposer<SqliteStore>, PlanWriter<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let aligner = SchemaAligner::new(Arc::clone(&store), EngineConfig::default());
        (Decomposer::new(aligner), PlanWriter::new(store))
    }

    #[test]
    fn test_write_plan_rows() {
        let (decomposer, writer) = setup();
        let record =
            Record::from_json(json!({"id": 1, "name": "Alice", "tags": ["x", "y"]})).unwrap();
        let plan = decomposer.decompose("users", &record, Cell::Integer(1)).unwrap();

        let report = writer.write(&plan).unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.tables["users"], 1);
        assert_eq!(report.tables["users_tags"], 2);

        let store = decomposer.aligner().store();
        let tags = store.rows("users_tags").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].get("value"), Some(&Cell::from("y")));
    }

    #[test]
    fn test_failed_insert_rolls_back_whole_plan() {
        let (decomposer, writer) = setup();
        let record = Record::from_json(json!({"id": 1, "tags": ["x"]})).unwrap();
        let mut plan = decomposer.decompose("users", &record, Cell::Integer(1)).unwrap();

        // Point the child write at a column the table does not have.
        plan.child_writes[0].rows[0].set("missing", Cell::Null);

        let err = writer.write(&plan).unwrap_err();
        assert!(matches!(err, Error::WriteFailed { ref table, .. } if table == "users_tags"));

        let store = decomposer.aligner().store();
        assert!(store.rows("users").unwrap().is_empty());
        assert!(store.rows("users_tags").unwrap().is_empty());
    }

    #[test]
    fn test_report_merge() {
        let mut a = WriteReport::default();
        a.add("t", 2);
        a.records = 1;
        let mut b = WriteReport::default();
        b.add("t", 1);
        b.add("u", 4);
        b.records = 1;

        a.merge(b);
        assert_eq!(a.records, 2);
        assert_eq!(a.rows_written, 7);
        assert_eq!(a.tables["t"], 3);
    }
}

//! End-to-end persistence of records
//!
//! [`Foundry`] wires an injected store to an aligner, a decomposer and a
//! plan writer. Persisting, aligning and decomposing are serialized, so a
//! record's parent and child rows are written as one unit and no DDL lands
//! inside another caller's transaction.

use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::melt::decompose::record_identity;
use crate::melt::{Decomposer, PlanWriter, WritePlan, WriteReport};
use crate::record::Record;
use crate::schema::{AlignmentResult, SchemaAligner};
use crate::store::{SqliteStore, TableStore};
use crate::types::{Cell, EngineConfig};

/// Persists hierarchical records into a relational store
pub struct Foundry<S> {
    store: Arc<S>,
    decomposer: Decomposer<S>,
    writer: PlanWriter<S>,
    write_lock: Mutex<()>,
}

impl Foundry<SqliteStore> {
    /// Open (or create) a SQLite database file
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let store = SqliteStore::open(path).map_err(|source| Error::StoreOpen {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        let store = SqliteStore::open_in_memory().map_err(|source| Error::StoreOpen {
            path: ":memory:".to_string(),
            source,
        })?;
        Ok(Self::new(Arc::new(store), config))
    }
}

impl<S: TableStore> Foundry<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let aligner = SchemaAligner::new(Arc::clone(&store), config);
        Foundry {
            decomposer: Decomposer::new(aligner),
            writer: PlanWriter::new(Arc::clone(&store)),
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        self.decomposer.aligner().config()
    }

    // Every call that issues DDL or opens a transaction holds this lock. The
    // store has one connection, so DDL from another caller would otherwise
    // land inside an open persist transaction and share its rollback.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Align `table` to the flat columns of an example record
    pub fn align(&self, table: &str, example: &Record) -> Result<AlignmentResult> {
        let _guard = self.lock();
        self.decomposer.aligner().align_record(table, example)
    }

    /// Build a write plan without writing any rows
    pub fn decompose(&self, table: &str, record: &Record, identity: Cell) -> Result<WritePlan> {
        let _guard = self.lock();
        self.decomposer.decompose(table, record, identity)
    }

    /// Align, decompose and write one record.
    ///
    /// A record carrying a scalar id field uses it as its identity. Otherwise
    /// the parent row is inserted first and the store's row id becomes the
    /// identity its child rows reference. Either way every row of the record
    /// is written in a single transaction.
    pub fn persist(&self, table: &str, record: &Record) -> Result<WriteReport> {
        self.persist_with_plan(table, record).map(|(_, report)| report)
    }

    /// Like [`persist`](Self::persist), also returning the plan that was written
    pub fn persist_with_plan(&self, table: &str, record: &Record) -> Result<(WritePlan, WriteReport)> {
        let _guard = self.lock();

        if let Some(identity) = record_identity(record, self.config()) {
            let plan = self.decomposer.decompose(table, record, identity)?;
            let report = self.writer.write(&plan)?;
            return Ok((plan, report));
        }

        self.decomposer.validate(table, record)?;
        let aligned = self.decomposer.aligner().align_record(table, record)?;
        let parent_row = self.decomposer.flatten(&aligned.table, record)?;

        self.writer.transaction(&aligned.table, || {
            let rowid = self.writer.insert_row(&aligned.table, &parent_row)?;
            let identity = rowid.map(Cell::Integer).unwrap_or(Cell::Null);
            debug!(table = %aligned.table, identity = %identity, "parent row inserted");

            let plan = self.decomposer.decompose(&aligned.table, record, identity)?;
            let mut report = self.writer.insert_plan(&plan, false)?;
            report.merge(WriteReport {
                records: 0,
                rows_written: 1,
                tables: [(aligned.table.clone(), 1)].into_iter().collect(),
            });
            Ok((plan, report))
        })
    }

    /// Persist newline-delimited JSON objects, skipping blank lines
    pub fn persist_json<R: BufRead>(&self, table: &str, reader: R) -> Result<WriteReport> {
        let mut report = WriteReport::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = Record::from_json_str(line).map_err(|e| match e {
                Error::Json(err) => Error::InvalidRecord(format!("line {}: {}", index + 1, err)),
                Error::InvalidRecord(msg) => {
                    Error::InvalidRecord(format!("line {}: {}", index + 1, msg))
                }
                other => other,
            })?;
            report.merge(self.persist(table, &record)?);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn test_persist_with_id_field() {
        let foundry = Foundry::open_in_memory(EngineConfig::default()).unwrap();
        let report = foundry
            .persist("users", &record(json!({"id": 7, "name": "Alice", "tags": ["x", "y"]})))
            .unwrap();

        assert_eq!(report.records, 1);
        assert_eq!(report.rows_written, 3);

        let tags = foundry.store().rows("users_tags").unwrap();
        assert!(tags.iter().all(|r| r.get("users_id") == Some(&Cell::Integer(7))));
    }

    #[test]
    fn test_persist_without_id_uses_rowid() {
        let foundry = Foundry::open_in_memory(EngineConfig::default()).unwrap();
        foundry
            .persist("notes", &record(json!({"text": "a", "tags": ["x"]})))
            .unwrap();
        foundry
            .persist("notes", &record(json!({"text": "b", "tags": ["y", "z"]})))
            .unwrap();

        let tags = foundry.store().rows("notes_tags").unwrap();
        let owners: Vec<_> = tags.iter().map(|r| r.get("notes_id").cloned()).collect();
        assert_eq!(
            owners,
            vec![
                Some(Cell::Integer(1)),
                Some(Cell::Integer(2)),
                Some(Cell::Integer(2))
            ]
        );
    }

    #[test]
    fn test_persist_empty_record() {
        let foundry = Foundry::open_in_memory(EngineConfig::default()).unwrap();
        let report = foundry.persist("blank", &Record::new()).unwrap();
        assert_eq!(report.rows_written, 1);
        assert_eq!(foundry.store().rows("blank").unwrap().len(), 1);
    }

    #[test]
    fn test_too_deep_record_writes_nothing() {
        let config = EngineConfig {
            max_depth: 1,
            ..EngineConfig::default()
        };
        let foundry = Foundry::open_in_memory(config).unwrap();
        let err = foundry
            .persist("deep", &record(json!({"a": [{"b": [1]}]})))
            .unwrap_err();

        assert!(matches!(err, Error::DecompositionDepthExceeded { .. }));
        assert!(foundry.store().tables().unwrap().is_empty());
    }

    #[test]
    fn test_persist_json_lines() {
        let foundry = Foundry::open_in_memory(EngineConfig::default()).unwrap();
        let input = "{\"id\": 1, \"name\": \"Alice\"}\n\n{\"id\": 2, \"name\": \"Bob\", \"email\": \"b@x.com\"}\n";

        let report = foundry.persist_json("users", Cursor::new(input)).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.tables["users"], 2);

        let rows = foundry.store().rows("users").unwrap();
        assert_eq!(rows[0].get("email"), Some(&Cell::Null));
        assert_eq!(rows[1].get("email"), Some(&Cell::from("b@x.com")));
    }

    #[test]
    fn test_written_plan_uses_persisted_identity() {
        let foundry = Foundry::open_in_memory(EngineConfig::default()).unwrap();

        let (plan, _) = foundry
            .persist_with_plan("flags", &record(json!({"id": true, "tags": ["x"]})))
            .unwrap();
        assert_eq!(plan.identity, Cell::Integer(1));

        let (plan, _) = foundry
            .persist_with_plan("flags", &record(json!({"id": 2.5, "tags": ["y"]})))
            .unwrap();
        assert_eq!(plan.identity, Cell::Real(2.5));

        // Without an id the row id is used: this is the third flags row.
        let (plan, _) = foundry
            .persist_with_plan("flags", &record(json!({"tags": ["z"]})))
            .unwrap();
        assert_eq!(plan.identity, Cell::Integer(3));
        assert_eq!(
            plan.child_write("flags_tags").unwrap().rows[0].get("flags_id"),
            Some(&Cell::Integer(3))
        );
    }

    #[test]
    fn test_open_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("app.db");

        let err = Foundry::open(&path, EngineConfig::default()).err().unwrap();
        match &err {
            Error::StoreOpen { path: reported, .. } => {
                assert_eq!(reported, &path.display().to_string())
            }
            other => panic!("expected StoreOpen, got {other:?}"),
        }
        assert_eq!(err.table(), None);
    }

    #[test]
    fn test_persist_json_reports_line() {
        let foundry = Foundry::open_in_memory(EngineConfig::default()).unwrap();
        let err = foundry
            .persist_json("users", Cursor::new("{\"id\": 1}\n[1, 2]\n"))
            .unwrap_err();
        match err {
            Error::InvalidRecord(msg) => assert!(msg.starts_with("line 2:"), "{msg}"),
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
    }
}

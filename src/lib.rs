//! # Foundry - Schema-Flexible Record Persistence
//!
//! Persist loosely-structured JSON records into a relational store without
//! declaring a schema up front. Tables and columns are inferred from the
//! records themselves and only ever grow.
//!
//! ## Modules
//!
//! - **schema**: Infer column sets from records and align tables to them additively
//! - **melt**: Decompose lists into child tables and write the resulting rows
//! - **store**: The [`TableStore`] seam and its SQLite implementation
//! - **naming**: Deterministic table, column and foreign-key names
//!
//! ## Quick Start
//!
//! ```rust
//! use foundry::{Cell, EngineConfig, Foundry, Record, TableStore};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let foundry = Foundry::open_in_memory(EngineConfig::default())?;
//!
//! let record = Record::from_json(json!({
//!     "id": 1,
//!     "name": "Alice",
//!     "tags": ["admin", "ops"]
//! }))?;
//! let report = foundry.persist("users", &record)?;
//!
//! // one users row, two users_tags rows keyed by users_id
//! assert_eq!(report.rows_written, 3);
//! let tags = foundry.store().rows("users_tags")?;
//! assert_eq!(tags[0].get("users_id"), Some(&Cell::Integer(1)));
//! # Ok(())
//! # }
//! ```
//!
//! ### Schema Alignment Only
//!
//! ```rust
//! use foundry::{EngineConfig, Foundry, Record};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let foundry = Foundry::open_in_memory(EngineConfig::default())?;
//! let example = Record::from_json(json!({"id": 1, "email": "a@example.com"}))?;
//!
//! let first = foundry.align("users", &example)?;
//! assert!(first.created);
//! // aligning again to the same shape issues no DDL
//! assert!(foundry.align("users", &example)?.is_noop());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod melt;
pub mod naming;
pub mod persist;
pub mod record;
pub mod schema;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use melt::{
    record_identity, ChildTableBinding, ChildWrite, Decomposer, PlanWriter, WritePlan, WriteReport,
};
pub use naming::{
    derive_child_table_name, derive_endpoint_table_name, derive_foreign_key_column,
    sanitize_identifier,
};
pub use persist::Foundry;
pub use record::{Record, Value};
pub use schema::{extract_schema, infer_type, AlignmentResult, Extraction, SchemaAligner};
pub use store::{SqliteStore, StoreError, TableStore};
pub use types::{Cell, ColumnSet, ColumnSpec, ColumnType, EngineConfig, Row};

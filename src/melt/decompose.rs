//! Decomposition of records into parent and child rows
//!
//! List fields are split off into child tables named after the parent table
//! and the field. Each child row carries a foreign key holding the identity
//! of the row it came from. Child tables are created or widened on demand,
//! but rows are only planned, never written, so a [`WritePlan`] can be
//! inspected or written later by the caller.

use tracing::debug;

use crate::error::{Error, Result};
use crate::melt::plan::{ChildTableBinding, ChildWrite, WritePlan};
use crate::naming::{child_identity, column_name, table_name};
use crate::record::{Record, Value};
use crate::schema::align::SchemaAligner;
use crate::schema::extract::{extract_elements, extract_schema};
use crate::store::TableStore;
use crate::types::{Cell, ColumnSpec, ColumnType, EngineConfig, Row};

/// A list and the identity of the row that owns it
struct Owner<'r> {
    identity: Cell,
    elements: &'r [Value],
}

/// Splits records into write plans, aligning every table it touches
pub struct Decomposer<S> {
    aligner: SchemaAligner<S>,
}

impl<S> Clone for Decomposer<S> {
    fn clone(&self) -> Self {
        Decomposer {
            aligner: self.aligner.clone(),
        }
    }
}

impl<S: TableStore> Decomposer<S> {
    pub fn new(aligner: SchemaAligner<S>) -> Self {
        Decomposer { aligner }
    }

    pub fn aligner(&self) -> &SchemaAligner<S> {
        &self.aligner
    }

    fn config(&self) -> &EngineConfig {
        self.aligner.config()
    }

    /// Decompose `record` into a write plan for `table`.
    ///
    /// `identity` is the value child rows use as their foreign key. The
    /// record's list nesting is checked against the configured depth before
    /// any table is created or altered; a record that is too deep is
    /// rejected whole.
    pub fn decompose(&self, table: &str, record: &Record, identity: Cell) -> Result<WritePlan> {
        let table = table_name(table)?;
        check_depth(&table, record, 1, self.config())?;

        let extraction = extract_schema(&table, record, self.config())?;
        self.aligner.align(&table, &extraction.columns)?;
        let parent_row = flatten_fields(&table, record, self.config())?;

        let mut child_writes = Vec::new();
        for field in &extraction.list_fields {
            let Some(Value::List(elements)) = record.get(field) else {
                continue;
            };
            let owners = vec![Owner {
                identity: identity.clone(),
                elements,
            }];
            self.decompose_field(&table, field, &owners, &mut child_writes)?;
        }

        debug!(
            table = %table,
            child_tables = child_writes.len(),
            child_rows = child_writes.iter().map(|w| w.rows.len()).sum::<usize>(),
            "decomposed record"
        );

        Ok(WritePlan {
            table,
            identity,
            parent_row,
            child_writes,
        })
    }

    /// Check depth and parent columns of `record` without touching the store
    pub fn validate(&self, table: &str, record: &Record) -> Result<()> {
        let table = table_name(table)?;
        check_depth(&table, record, 1, self.config())?;
        extract_schema(&table, record, self.config())?;
        Ok(())
    }

    /// The flattened parent row alone, without aligning anything.
    ///
    /// Used when the parent row must be inserted before its identity is
    /// known.
    pub fn flatten(&self, table: &str, record: &Record) -> Result<Row> {
        let table = table_name(table)?;
        extract_schema(&table, record, self.config())?;
        flatten_fields(&table, record, self.config())
    }

    /// Plan one child table from the lists of every owner that has `field`
    fn decompose_field(
        &self,
        parent_table: &str,
        field: &str,
        owners: &[Owner<'_>],
        out: &mut Vec<ChildWrite>,
    ) -> Result<()> {
        let config = self.config();
        let binding = ChildTableBinding::derive(parent_table, field);
        let child_table = binding.child_table.as_str();
        let foreign_key = binding.foreign_key_column.as_str();

        let all_elements: Vec<Value> = owners
            .iter()
            .flat_map(|o| o.elements.iter().cloned())
            .collect();
        let extraction = extract_elements(child_table, &all_elements, config)?;

        let mut columns = extraction.columns.clone();
        if columns.contains(foreign_key) {
            return Err(Error::SchemaConflict {
                table: child_table.to_string(),
                column: foreign_key.to_string(),
                first: foreign_key.to_string(),
                second: format!("foreign key to {}", parent_table),
            });
        }

        let id_column = column_name(child_table, &config.id_field)?;
        let mut rows = Vec::with_capacity(all_elements.len());
        // element identity and record, for elements that own nested lists
        let mut nested_owners: Vec<(Cell, &Record)> = Vec::new();

        for owner in owners {
            columns.merge(ColumnSpec::new(foreign_key, cell_type(&owner.identity)));

            for (index, element) in owner.elements.iter().enumerate() {
                let mut row = match element {
                    Value::Record(record) => flatten_fields(child_table, record, config)?,
                    scalar => {
                        let mut row = Row::new();
                        row.set(config.value_column.clone(), to_cell(scalar)?);
                        row
                    }
                };
                row.set(foreign_key, owner.identity.clone());

                if let Value::Record(record) = element {
                    if has_nested_lists(record, config) {
                        let element_identity = match record_identity(record, config) {
                            Some(cell) => cell,
                            None => {
                                let cell = Cell::Text(child_identity(
                                    &owner.identity.to_string(),
                                    field,
                                    index,
                                ));
                                row.set(id_column.clone(), cell.clone());
                                columns.merge(ColumnSpec::new(id_column.clone(), ColumnType::Text));
                                cell
                            }
                        };
                        nested_owners.push((element_identity, record));
                    }
                }
                rows.push(row);
            }
        }

        self.aligner.align(child_table, &columns)?;

        out.push(ChildWrite {
            binding: binding.clone(),
            rows,
        });

        for nested_field in &extraction.list_fields {
            let owners: Vec<Owner<'_>> = nested_owners
                .iter()
                .filter_map(|(identity, record)| match record.get(nested_field) {
                    Some(Value::List(elements)) => Some(Owner {
                        identity: identity.clone(),
                        elements,
                    }),
                    _ => None,
                })
                .collect();
            self.decompose_field(child_table, nested_field, &owners, out)?;
        }

        Ok(())
    }
}

/// Reject records whose list nesting exceeds the configured depth
fn check_depth(table: &str, record: &Record, depth: usize, config: &EngineConfig) -> Result<()> {
    for (field, value) in record.iter() {
        let Value::List(elements) = value else {
            continue;
        };
        if config.is_inline_field(field) {
            continue;
        }
        if depth > config.max_depth {
            return Err(Error::DecompositionDepthExceeded {
                table: table.to_string(),
                field: field.to_string(),
                max_depth: config.max_depth,
            });
        }
        for element in elements {
            if let Value::Record(inner) = element {
                check_depth(table, inner, depth + 1, config)?;
            }
        }
    }
    Ok(())
}

fn has_nested_lists(record: &Record, config: &EngineConfig) -> bool {
    record
        .iter()
        .any(|(field, value)| value.is_list() && !config.is_inline_field(field))
}

/// A record's own identity, if its id field holds a usable scalar
pub fn record_identity(record: &Record, config: &EngineConfig) -> Option<Cell> {
    match record.get(&config.id_field)? {
        Value::Integer(i) => Some(Cell::Integer(*i)),
        Value::Text(s) => Some(Cell::Text(s.clone())),
        Value::Real(r) => Some(Cell::Real(*r)),
        Value::Bool(b) => Some(Cell::Integer(i64::from(*b))),
        Value::Null | Value::Record(_) | Value::List(_) => None,
    }
}

/// Flatten every non-list field; nested records and inline lists become JSON text
fn flatten_fields(table: &str, record: &Record, config: &EngineConfig) -> Result<Row> {
    let mut row = Row::new();
    for (field, value) in record.iter() {
        if value.is_list() && !config.is_inline_field(field) {
            continue;
        }
        row.set(column_name(table, field)?, to_cell(value)?);
    }
    Ok(row)
}

fn to_cell(value: &Value) -> Result<Cell> {
    Ok(match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Integer(i64::from(*b)),
        Value::Integer(i) => Cell::Integer(*i),
        Value::Real(r) => Cell::Real(*r),
        Value::Text(s) => Cell::Text(s.clone()),
        Value::Record(_) | Value::List(_) => Cell::Text(serde_json::to_string(&value.to_json())?),
    })
}

fn cell_type(cell: &Cell) -> ColumnType {
    match cell {
        Cell::Integer(_) => ColumnType::Integer,
        Cell::Real(_) => ColumnType::Real,
        Cell::Text(_) | Cell::Null => ColumnType::Text,
    }
}

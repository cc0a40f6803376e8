//! Write plans produced by decomposition
//!
//! A [`WritePlan`] describes every row a record turns into: one flattened
//! parent row plus, for each list field, the rows of its child table. Plans
//! are plain data; nothing here touches the store.

use serde::Serialize;

use crate::naming::{derive_child_table_name, derive_foreign_key_column};
use crate::types::{Cell, Row};

/// How a list field of a parent table maps onto its child table.
///
/// Bindings are derived, never stored: the same `(parent_table, field_name)`
/// pair always yields the same child table and foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChildTableBinding {
    pub parent_table: String,
    pub field_name: String,
    pub child_table: String,
    pub foreign_key_column: String,
}

impl ChildTableBinding {
    pub fn derive(parent_table: &str, field_name: &str) -> Self {
        ChildTableBinding {
            parent_table: parent_table.to_string(),
            field_name: field_name.to_string(),
            child_table: derive_child_table_name(parent_table, field_name),
            foreign_key_column: derive_foreign_key_column(parent_table),
        }
    }
}

/// Rows destined for one child table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildWrite {
    pub binding: ChildTableBinding,
    pub rows: Vec<Row>,
}

/// Everything needed to write one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritePlan {
    pub table: String,
    /// Value child rows use to reference the parent row
    pub identity: Cell,
    pub parent_row: Row,
    /// Ordered so that every table comes after the table it references
    pub child_writes: Vec<ChildWrite>,
}

impl WritePlan {
    /// The child write targeting `child_table`, if any
    pub fn child_write(&self, child_table: &str) -> Option<&ChildWrite> {
        self.child_writes
            .iter()
            .find(|w| w.binding.child_table == child_table)
    }

    /// Every table the plan touches, parent first
    pub fn tables(&self) -> Vec<&str> {
        std::iter::once(self.table.as_str())
            .chain(self.child_writes.iter().map(|w| w.binding.child_table.as_str()))
            .collect()
    }

    /// Number of child rows across all child tables
    pub fn child_row_count(&self) -> usize {
        self.child_writes.iter().map(|w| w.rows.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_derivation() {
        let binding = ChildTableBinding::derive("users", "tags");
        assert_eq!(binding.child_table, "users_tags");
        assert_eq!(binding.foreign_key_column, "users_id");
        assert_eq!(binding, ChildTableBinding::derive("users", "tags"));
    }

    #[test]
    fn test_plan_accessors() {
        let plan = WritePlan {
            table: "users".to_string(),
            identity: Cell::Integer(1),
            parent_row: Row::new(),
            child_writes: vec![
                ChildWrite {
                    binding: ChildTableBinding::derive("users", "tags"),
                    rows: vec![Row::new(), Row::new()],
                },
                ChildWrite {
                    binding: ChildTableBinding::derive("users", "posts"),
                    rows: vec![],
                },
            ],
        };

        assert_eq!(plan.tables(), vec!["users", "users_tags", "users_posts"]);
        assert_eq!(plan.child_row_count(), 2);
        assert!(plan.child_write("users_posts").unwrap().rows.is_empty());
        assert!(plan.child_write("users_missing").is_none());
    }
}

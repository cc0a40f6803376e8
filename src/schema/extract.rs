//! Schema extraction from example records
//!
//! Walks a record once and splits its fields into flat columns and list
//! fields. List fields are not given a column; they are handed to the
//! decomposer, which turns each into a child table.
//!
//! Extraction accumulates observations instead of building one schema per
//! sample and merging afterwards, so the union schema of a whole list of
//! heterogeneous elements is computed in a single pass.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::naming::{column_name, sanitize_identifier};
use crate::record::{Record, Value};
use crate::schema::infer::infer_type;
use crate::types::{ColumnSet, ColumnSpec, ColumnType, EngineConfig};

/// Columns and list fields inferred from one or more samples
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub columns: ColumnSet,
    /// Raw names of list-valued fields, in first-seen order
    pub list_fields: Vec<String>,
}

/// Observations for a single column
#[derive(Debug, Default)]
struct ColumnStats {
    // Widened type of every non-null observation
    observed: Option<ColumnType>,
}

impl ColumnStats {
    fn add(&mut self, value: &Value) {
        if matches!(value, Value::Null) {
            return;
        }
        let ty = infer_type(value);
        self.observed = Some(match self.observed {
            Some(current) => current.widen(ty),
            None => ty,
        });
    }

    // A column that only ever saw nulls has no evidence beyond TEXT
    fn column_type(&self) -> ColumnType {
        self.observed.unwrap_or(ColumnType::Text)
    }
}

/// Accumulates column statistics across samples
#[derive(Debug)]
pub struct SchemaBuilder<'a> {
    table: &'a str,
    config: &'a EngineConfig,
    columns: HashMap<String, ColumnStats>,
    // sanitized column name -> raw field name that first claimed it
    column_sources: HashMap<String, String>,
    list_fields: Vec<String>,
    // sanitized child suffix -> raw list field name that first claimed it
    list_sources: HashMap<String, String>,
    sample_count: usize,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(table: &'a str, config: &'a EngineConfig) -> Self {
        SchemaBuilder {
            table,
            config,
            columns: HashMap::new(),
            column_sources: HashMap::new(),
            list_fields: Vec::new(),
            list_sources: HashMap::new(),
            sample_count: 0,
        }
    }

    /// Add one record's fields
    pub fn add_record(&mut self, record: &Record) -> Result<()> {
        self.sample_count += 1;
        for (field, value) in record.iter() {
            if value.is_list() && !self.config.is_inline_field(field) {
                self.add_list_field(field)?;
            } else {
                self.add_column(field, value)?;
            }
        }
        Ok(())
    }

    /// Add one list element: records contribute their fields, scalars the value column
    pub fn add_element(&mut self, element: &Value) -> Result<()> {
        match element {
            Value::Record(record) => self.add_record(record),
            scalar => {
                self.sample_count += 1;
                let config = self.config;
                self.add_column(&config.value_column, scalar)
            }
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn build(self) -> Extraction {
        let columns = self
            .columns
            .iter()
            .map(|(name, stats)| ColumnSpec::new(name.clone(), stats.column_type()))
            .collect();
        Extraction {
            columns,
            list_fields: self.list_fields,
        }
    }

    fn add_column(&mut self, field: &str, value: &Value) -> Result<()> {
        let column = self.claim_column(field)?;
        self.columns.entry(column).or_default().add(value);
        Ok(())
    }

    fn claim_column(&mut self, field: &str) -> Result<String> {
        let column = column_name(self.table, field)?;
        match self.column_sources.get(&column) {
            Some(source) if source != field => Err(Error::SchemaConflict {
                table: self.table.to_string(),
                column,
                first: source.clone(),
                second: field.to_string(),
            }),
            Some(_) => Ok(column),
            None => {
                self.column_sources.insert(column.clone(), field.to_string());
                Ok(column)
            }
        }
    }

    fn add_list_field(&mut self, field: &str) -> Result<()> {
        let suffix = sanitize_identifier(field);
        if suffix.is_empty() {
            return Err(Error::InvalidIdentifier {
                table: self.table.to_string(),
                raw: field.to_string(),
            });
        }
        match self.list_sources.get(&suffix) {
            Some(source) if source != field => Err(Error::SchemaConflict {
                table: self.table.to_string(),
                column: suffix,
                first: source.clone(),
                second: field.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.list_sources.insert(suffix, field.to_string());
                self.list_fields.push(field.to_string());
                Ok(())
            }
        }
    }
}

/// Infer the flat columns and list fields of a single record
pub fn extract_schema(table: &str, record: &Record, config: &EngineConfig) -> Result<Extraction> {
    let mut builder = SchemaBuilder::new(table, config);
    builder.add_record(record)?;
    Ok(builder.build())
}

/// Union schema of every element of a list
pub fn extract_elements(table: &str, elements: &[Value], config: &EngineConfig) -> Result<Extraction> {
    let mut builder = SchemaBuilder::new(table, config);
    for element in elements {
        builder.add_element(element)?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn test_scalars_become_columns() {
        let config = EngineConfig::default();
        let extraction = extract_schema(
            "users",
            &record(json!({"id": 1, "name": "Alice", "score": 9.5, "active": true, "note": null})),
            &config,
        )
        .unwrap();

        let columns = &extraction.columns;
        assert_eq!(columns.len(), 5);
        assert_eq!(columns.get("id"), Some(ColumnType::Integer));
        assert_eq!(columns.get("name"), Some(ColumnType::Text));
        assert_eq!(columns.get("score"), Some(ColumnType::Real));
        assert_eq!(columns.get("active"), Some(ColumnType::Integer));
        assert_eq!(columns.get("note"), Some(ColumnType::Text));
        assert!(extraction.list_fields.is_empty());
    }

    #[test]
    fn test_lists_are_not_columns() {
        let config = EngineConfig::default();
        let extraction = extract_schema(
            "users",
            &record(json!({"id": 1, "tags": ["x"], "posts": [{"id": 10}], "profile": {"age": 3}})),
            &config,
        )
        .unwrap();

        assert!(!extraction.columns.contains("tags"));
        assert!(!extraction.columns.contains("posts"));
        assert_eq!(extraction.columns.get("profile"), Some(ColumnType::Text));
        assert_eq!(extraction.list_fields, vec!["tags", "posts"]);
    }

    #[test]
    fn test_inline_fields_keep_a_text_column() {
        let config = EngineConfig {
            inline_fields: vec!["tags".to_string()],
            ..EngineConfig::default()
        };
        let extraction =
            extract_schema("users", &record(json!({"tags": ["x", "y"]})), &config).unwrap();

        assert_eq!(extraction.columns.get("tags"), Some(ColumnType::Text));
        assert!(extraction.list_fields.is_empty());
    }

    #[test]
    fn test_empty_record() {
        let extraction =
            extract_schema("t", &Record::new(), &EngineConfig::default()).unwrap();
        assert!(extraction.columns.is_empty());
        assert!(extraction.list_fields.is_empty());
    }

    #[test]
    fn test_field_order_does_not_change_the_set() {
        let config = EngineConfig::default();
        let a = extract_schema("t", &record(json!({"a": 1, "b": "x", "c": 1.5})), &config).unwrap();
        let b = extract_schema("t", &record(json!({"c": 1.5, "a": 1, "b": "x"})), &config).unwrap();
        assert_eq!(a.columns, b.columns);
    }

    #[test]
    fn test_sanitization_conflict_is_reported() {
        let err = extract_schema(
            "users",
            &record(json!({"first-name": "a", "firstname": "b"})),
            &EngineConfig::default(),
        )
        .unwrap_err();

        match err {
            Error::SchemaConflict { table, column, first, second } => {
                assert_eq!(table, "users");
                assert_eq!(column, "firstname");
                assert_eq!(first, "first-name");
                assert_eq!(second, "firstname");
            }
            other => panic!("expected SchemaConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_list_field_conflict_is_reported() {
        let err = extract_schema(
            "t",
            &record(json!({"a-b": [], "ab": []})),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { .. }));
    }

    #[test]
    fn test_field_that_sanitizes_to_nothing() {
        let err = extract_schema("t", &record(json!({"--": 1})), &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_heterogeneous_elements_union() {
        let elements: Vec<Value> = vec![
            Value::from(json!({"a": 1})),
            Value::from(json!({"b": "x", "a": 2.5})),
            Value::from(json!({"c": null, "nested": [1]})),
        ];
        let extraction = extract_elements("t_items", &elements, &EngineConfig::default()).unwrap();

        assert_eq!(extraction.columns.get("a"), Some(ColumnType::Real));
        assert_eq!(extraction.columns.get("b"), Some(ColumnType::Text));
        assert_eq!(extraction.columns.get("c"), Some(ColumnType::Text));
        assert_eq!(extraction.list_fields, vec!["nested"]);
    }

    #[test]
    fn test_scalar_elements_use_value_column() {
        let elements: Vec<Value> = vec![Value::from("x"), Value::Null, Value::from("y")];
        let extraction = extract_elements("t_tags", &elements, &EngineConfig::default()).unwrap();

        assert_eq!(extraction.columns.len(), 1);
        assert_eq!(extraction.columns.get("value"), Some(ColumnType::Text));
    }

    #[test]
    fn test_nulls_do_not_weaken_other_observations() {
        let elements: Vec<Value> = vec![
            Value::from(json!({"n": null})),
            Value::from(json!({"n": 4})),
        ];
        let extraction = extract_elements("t", &elements, &EngineConfig::default()).unwrap();
        assert_eq!(extraction.columns.get("n"), Some(ColumnType::Integer));
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage class of an inferred column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }

    /// Map a declared column type back to a tag using SQLite affinity rules
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }

    /// Least type able to hold both observations.
    ///
    /// Only used while merging samples inside one extraction; columns that
    /// already exist in the store are never retyped.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Integer, ColumnType::Real) | (ColumnType::Real, ColumnType::Integer) => {
                ColumnType::Real
            }
            _ => ColumnType::Text,
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            column_type,
        }
    }
}

/// A set of columns keyed by name.
///
/// Iteration is sorted by name so generated DDL is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSet {
    columns: BTreeMap<String, ColumnType>,
}

impl ColumnSet {
    pub fn new() -> Self {
        ColumnSet::default()
    }

    /// Insert a column, keeping the existing type if the name is already present
    pub fn insert(&mut self, column: ColumnSpec) -> bool {
        if self.columns.contains_key(&column.name) {
            return false;
        }
        self.columns.insert(column.name, column.column_type);
        true
    }

    /// Insert a column, widening the type if the name is already present
    pub fn merge(&mut self, column: ColumnSpec) {
        self.columns
            .entry(column.name)
            .and_modify(|existing| *existing = existing.widen(column.column_type))
            .or_insert(column.column_type);
    }

    pub fn merge_all(&mut self, other: &ColumnSet) {
        for column in other.iter() {
            self.merge(column);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    /// Columns of `self` whose names are absent from `current`
    pub fn missing_from(&self, current: &ColumnSet) -> Vec<ColumnSpec> {
        self.iter().filter(|c| !current.contains(&c.name)).collect()
    }

    pub fn is_superset_of(&self, other: &ColumnSet) -> bool {
        other.columns.keys().all(|name| self.contains(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnSpec> + '_ {
        self.columns
            .iter()
            .map(|(name, ty)| ColumnSpec::new(name.clone(), *ty))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<ColumnSpec> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = ColumnSpec>>(iter: I) -> Self {
        let mut set = ColumnSet::new();
        for column in iter {
            set.merge(column);
        }
        set
    }
}

/// A bound SQL value in a flattened row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Real(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One flattened row: sanitized column names paired with bound values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    /// Set a column, replacing any earlier value for the same name
    pub fn set(&mut self, column: impl Into<String>, cell: Cell) {
        let column = column.into();
        if let Some(slot) = self.cells.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = cell;
        } else {
            self.cells.push((column, cell));
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Cell)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, cell) in iter {
            row.set(name, cell);
        }
        row
    }
}

/// Configuration for inference and decomposition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum list nesting depth (1 = lists directly on the root record)
    pub max_depth: usize,

    /// Field whose scalar value identifies a record
    pub id_field: String,

    /// Column holding scalar list elements in child tables
    pub value_column: String,

    /// List fields stored inline as serialized text instead of child tables
    pub inline_fields: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: 10,
            id_field: String::from("id"),
            value_column: String::from("value"),
            inline_fields: vec![],
        }
    }
}

impl EngineConfig {
    pub fn is_inline_field(&self, field_name: &str) -> bool {
        self.inline_fields.iter().any(|f| f == field_name)
    }
}

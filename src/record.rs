//! Hierarchical records
//!
//! A [`Record`] is an ordered set of uniquely named fields whose values may be
//! scalars, nested records, or lists. Records are usually built from
//! `serde_json::Value` input.

use crate::error::{Error, Result};
use serde_json::Number;

/// A field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Record(Record),
    List(Vec<Value>),
}

impl Value {
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Convert back to JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Real(r) => Number::from_f64(*r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Record(r) => r.to_json(),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    // u64 beyond i64::MAX and fractional numbers both land here
                    Value::Real(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => Value::Record(Record::from_map(obj)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

/// An ordered mapping from field name to [`Value`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Parse a JSON object into a record
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(obj) = value else {
            return Err(Error::InvalidRecord(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        };
        reject_empty_keys(&obj)?;
        Ok(Self::from_map(obj))
    }

    // serde_json maps cannot hold duplicate keys. Empty keys are skipped here
    // and rejected up front by from_json.
    fn from_map(obj: serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = obj
            .into_iter()
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key, Value::from(value)))
            .collect();
        Record { fields }
    }

    /// Parse a JSON text into a record
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(value)
    }

    /// Insert or replace a field; a replaced field keeps its position
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidRecord("field names must be non-empty".to_string()));
        }
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
        Ok(())
    }

    /// Builder-style insert for fixtures and literals
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

fn reject_empty_keys(obj: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    for (key, value) in obj {
        if key.is_empty() {
            return Err(Error::InvalidRecord("field names must be non-empty".to_string()));
        }
        reject_empty_keys_in(value)?;
    }
    Ok(())
}

// Lists may nest lists, so walk every array item, not just direct objects
fn reject_empty_keys_in(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(inner) => reject_empty_keys(inner),
        serde_json::Value::Array(items) => items.iter().try_for_each(reject_empty_keys_in),
        _ => Ok(()),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

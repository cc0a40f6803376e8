//! Column type inference for single values

use crate::record::Value;
use crate::types::ColumnType;

/// Column type for one example value.
///
/// Every value maps to a type. Null carries no evidence and falls back to
/// TEXT, booleans are stored as 0/1, and nested records or lists that end up
/// inline are stored as serialized TEXT.
pub fn infer_type(value: &Value) -> ColumnType {
    match value {
        Value::Null => ColumnType::Text,
        Value::Bool(_) => ColumnType::Integer,
        Value::Integer(_) => ColumnType::Integer,
        Value::Real(r) if is_integral(*r) => ColumnType::Integer,
        Value::Real(_) => ColumnType::Real,
        Value::Text(_) => ColumnType::Text,
        Value::Record(_) | Value::List(_) => ColumnType::Text,
    }
}

// Whole-valued reals that fit i64 are treated as integers, so 2.0 and 2
// infer the same column.
fn is_integral(r: f64) -> bool {
    r.is_finite() && r.fract() == 0.0 && r >= i64::MIN as f64 && r < i64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn test_scalars() {
        assert_eq!(infer_type(&Value::Null), ColumnType::Text);
        assert_eq!(infer_type(&Value::Bool(true)), ColumnType::Integer);
        assert_eq!(infer_type(&Value::Integer(-4)), ColumnType::Integer);
        assert_eq!(infer_type(&Value::Real(3.25)), ColumnType::Real);
        assert_eq!(infer_type(&Value::Text("x".into())), ColumnType::Text);
    }

    #[test]
    fn test_integral_real_is_integer() {
        assert_eq!(infer_type(&Value::Real(2.0)), ColumnType::Integer);
        assert_eq!(infer_type(&Value::Real(f64::NAN)), ColumnType::Real);
        assert_eq!(infer_type(&Value::Real(1e300)), ColumnType::Real);
    }

    #[test]
    fn test_nested_values_are_text() {
        assert_eq!(infer_type(&Value::Record(Record::new())), ColumnType::Text);
        assert_eq!(infer_type(&Value::List(vec![])), ColumnType::Text);
    }
}

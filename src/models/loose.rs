// src/models/loose.rs
//! Lenient readers for tree records.
//!
//! Records come from a schemaless tree written by several clients, so a
//! field may be missing, null, or of an unexpected JSON type. None of the
//! readers here ever fail: anything unusable reads as absent.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Text of a field: strings as is, non-zero numbers in decimal form,
/// `true` as "true". Empty strings, `0`, `false`, null, objects and arrays
/// read as absent.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Numeric value of a field: JSON numbers, or strings holding a finite number.
pub fn value_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() { Some(n) } else { None }
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}

pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_number(&value))
}

/// Nested children of a record (objects, or arrays read index -> item).
pub fn children<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Map::new(),
    })
}

/// Trimmed, lowercased text used for name matching.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// First accessor yielding a non-empty trimmed string.
pub fn first_non_empty<T>(record: &T, accessors: &[fn(&T) -> Option<&str>]) -> Option<String> {
    accessors
        .iter()
        .filter_map(|accessor| accessor(record))
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
}

/// A record stored under an id inside a collection.
pub trait TreeRecord: DeserializeOwned + Default {
    fn set_id(&mut self, id: &str);

    /// Build the record from its stored value; non-object values yield an
    /// empty record carrying only the id.
    fn from_entry(id: &str, value: &Value) -> Self {
        let mut record: Self = match value {
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_default(),
            _ => Self::default(),
        };
        record.set_id(id);
        record
    }
}

pub fn collect_records<T: TreeRecord>(collection: &Map<String, Value>) -> Vec<T> {
    collection
        .iter()
        .map(|(id, value)| T::from_entry(id, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("LAB001")), Some("LAB001".to_string()));
        assert_eq!(value_text(&json!(7)), Some("7".to_string()));
        assert_eq!(value_text(&json!("")), None);
        assert_eq!(value_text(&json!(0)), None);
        assert_eq!(value_text(&json!(false)), None);
        assert_eq!(value_text(&json!({"a": 1})), None);
        assert_eq!(value_text(&Value::Null), None);
    }

    #[test]
    fn test_value_number() {
        assert_eq!(value_number(&json!(3)), Some(3.0));
        assert_eq!(value_number(&json!(" -2 ")), Some(-2.0));
        assert_eq!(value_number(&json!("")), None);
        assert_eq!(value_number(&json!("abc")), None);
        assert_eq!(value_number(&json!("inf")), None);
        assert_eq!(value_number(&json!(true)), None);
    }

    #[test]
    fn test_first_non_empty_skips_blank_candidates() {
        struct Named {
            a: Option<String>,
            b: Option<String>,
        }
        fn a(n: &Named) -> Option<&str> {
            n.a.as_deref()
        }
        fn b(n: &Named) -> Option<&str> {
            n.b.as_deref()
        }

        let named = Named { a: Some("   ".to_string()), b: Some(" Beaker ".to_string()) };
        assert_eq!(first_non_empty(&named, &[a, b]), Some("Beaker".to_string()));

        let empty = Named { a: None, b: None };
        assert_eq!(first_non_empty(&empty, &[a, b]), None);
    }
}

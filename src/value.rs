//! Dynamic values stored on model instances and exchanged with adapters.
//!
//! Every property value, raw storage row and filter operand is a [`Value`].
//! Rows are ordered maps so property declaration order survives a round trip
//! through any backend.
//!
//! ```
//! use netabase_orm::row;
//! use netabase_orm::value::Value;
//!
//! let data = row! { "name" => "Alice", "age" => 30 };
//! assert_eq!(data["name"], Value::from("Alice"));
//! assert_eq!(data["age"].key_string(), "30");
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::list::List;

/// An ordered property-name -> value mapping; the unit of storage.
pub type Row = IndexMap<String, Value>;

/// A dynamically typed property value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    /// Ordered list container produced by list-typed properties.
    List(List),
    Object(Row),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Row> {
        match self {
            Value::Object(row) => Some(row),
            _ => None,
        }
    }

    /// Items of an array or list value.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            Value::List(list) => Some(list.items()),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Truthiness used by boolean coercion and `if`/`unless` conditions.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Undefined, null, empty string and empty list all count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::List(list) => list.is_empty(),
            _ => false,
        }
    }

    /// Length of string (in characters) or list values.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::List(list) => Some(list.len()),
            _ => None,
        }
    }

    /// String form used for identity and loose equality comparisons.
    ///
    /// Identities differ in type across backends (auto-increment integers,
    /// UUID strings), so keys are always compared through this form.
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 => {
                (*f as i64).to_string()
            }
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339(),
            Value::Array(items) => join_keys(items),
            Value::List(list) => join_keys(list.items()),
            Value::Object(_) => self.to_json().to_string(),
        }
    }

    /// Loose equality: equal string forms.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => self.key_string() == other.key_string(),
        }
    }

    /// Ordering between comparable values. Numbers compare across int/float,
    /// dates compare with RFC 3339 strings, everything else by string form.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (a, b) if a.is_number() && b.is_number() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::String(s)) => {
                crate::utils::datetime::parse(s).map(|b| a.cmp(&b))
            }
            (Value::String(s), Value::Date(b)) => {
                crate::utils::datetime::parse(s).map(|a| a.cmp(b))
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => Some(a.key_string().cmp(&b.key_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::List(list) => {
                serde_json::Value::Array(list.items().iter().map(Value::to_json).collect())
            }
            Value::Object(row) => serde_json::Value::Object(
                row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
            ),
        }
    }
}

fn join_keys(items: &[Value]) -> String {
    items
        .iter()
        .map(Value::key_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_string())
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )*
    };
}

impl_from_value!(
    bool => |v| Value::Bool(v),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    u32 => |v| Value::Int(i64::from(v)),
    u64 => |v| i64::try_from(v).map(Value::Int).unwrap_or(Value::Float(v as f64)),
    usize => |v| i64::try_from(v).map(Value::Int).unwrap_or(Value::Float(v as f64)),
    f32 => |v| Value::Float(f64::from(v)),
    f64 => |v| Value::Float(v),
    &str => |v| Value::String(v.to_string()),
    String => |v| Value::String(v),
    &String => |v| Value::String(v.clone()),
    DateTime<Utc> => |v| Value::Date(v),
    Vec<Value> => |v| Value::Array(v),
    List => |v| Value::List(v),
    Row => |v| Value::Object(v),
    serde_json::Value => |v| Value::from_json(v),
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

/// Build a [`Row`] from `key => value` pairs.
#[macro_export]
macro_rules! row {
    () => {
        $crate::value::Row::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::value::Row::new();
        $(
            row.insert(::std::string::String::from($key), $crate::value::Value::from($value));
        )+
        row
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_keys_compare_across_types() {
        assert!(Value::Int(7).loose_eq(&Value::from("7")));
        assert!(Value::Float(7.0).loose_eq(&Value::Int(7)));
        assert!(!Value::Null.loose_eq(&Value::from("null")));
    }

    #[test]
    fn truthiness_follows_loose_rules() {
        assert!(!Value::from("").truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::from("false").truthy());
        assert!(Value::Array(vec![]).truthy());
    }

    #[test]
    fn untagged_rows_survive_json() {
        let row = row! { "id" => 1, "name" => "x", "ratio" => 0.5, "tags" => vec![Value::from("a")] };
        let bytes = serde_json::to_vec(&row).unwrap();
        let back: Row = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn numbers_order_across_representations() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Null.compare(&Value::Int(0)), Some(Ordering::Less));
    }
}

//! Column values.
//!
//! [`Value`] is the closed set of scalar values fastgear moves between
//! entities, statements and sessions. It converts into `sea_query::Value`
//! for rendering and back out of rows through [`ValueType`].
//!
//! ```
//! use fastgear::{Value, ValueType};
//!
//! let v = 42i64.into_value();
//! assert_eq!(v, Value::Int(42));
//! assert_eq!(i64::from_value(&v), Some(42));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::ColumnType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Text(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Orders two values of compatible types. Nulls and mismatched types
    /// are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Json(a), Value::Json(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// SQL `IS DISTINCT FROM`: nulls compare equal to each other.
    pub fn is_distinct_from(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => false,
            (Value::Null, _) | (_, Value::Null) => true,
            _ => self.compare(other) != Some(Ordering::Equal),
        }
    }

    /// Text rendering used by `CAST(col AS TEXT)` style matching.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Parses an identifier string according to the type of the column it
    /// targets.
    pub fn parse_as(column_type: ColumnType, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match column_type {
            ColumnType::Integer | ColumnType::BigInteger => raw.parse().ok().map(Value::Int),
            ColumnType::Float => raw.parse().ok().map(Value::Float),
            ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(Value::Bool(true)),
                "false" | "f" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            ColumnType::Text => Some(Value::Text(raw.to_string())),
            ColumnType::Timestamp => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc))),
            ColumnType::Uuid => Uuid::parse_str(raw).ok().map(Value::Uuid),
            ColumnType::Json => serde_json::from_str(raw).ok().map(Value::Json),
        }
    }

    /// Converts a JSON scalar into a value. Arrays and objects stay JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Json(other.clone()),
        }
    }

    /// Converts into a `sea_query::Value`. `column_type` picks the typed
    /// null when the value is [`Value::Null`].
    pub fn to_sea_value(&self, column_type: Option<ColumnType>) -> sea_query::Value {
        match self {
            Value::Null => match column_type {
                Some(ColumnType::Integer) => sea_query::Value::Int(None),
                Some(ColumnType::BigInteger) => sea_query::Value::BigInt(None),
                Some(ColumnType::Float) => sea_query::Value::Double(None),
                Some(ColumnType::Boolean) => sea_query::Value::Bool(None),
                Some(ColumnType::Timestamp) => sea_query::Value::ChronoDateTimeUtc(None),
                Some(ColumnType::Uuid) => sea_query::Value::Uuid(None),
                Some(ColumnType::Json) => sea_query::Value::Json(None),
                Some(ColumnType::Text) | None => sea_query::Value::String(None),
            },
            Value::Bool(b) => (*b).into(),
            Value::Int(i) => match column_type {
                Some(ColumnType::Integer) => i32::try_from(*i)
                    .map(sea_query::Value::from)
                    .unwrap_or_else(|_| (*i).into()),
                _ => (*i).into(),
            },
            Value::Float(f) => (*f).into(),
            Value::Text(s) => s.clone().into(),
            Value::Timestamp(ts) => (*ts).into(),
            Value::Uuid(u) => (*u).into(),
            Value::Json(j) => j.clone().into(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => {
                std::mem::discriminant(self) == std::mem::discriminant(other)
                    && self.compare(other) == Some(Ordering::Equal)
            }
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::Json(j) => j.to_string().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Json(j) => write!(f, "{j}"),
        }
    }
}

/// Conversion between Rust types and [`Value`].
///
/// Entities use it in `from_row`/`to_row`; `from_value` returns `None` when
/// the value holds a different variant.
pub trait ValueType: Sized {
    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! value_type {
    ($ty:ty, $variant:ident) => {
        impl ValueType for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

value_type!(bool, Bool);
value_type!(i64, Int);
value_type!(f64, Float);
value_type!(String, Text);
value_type!(DateTime<Utc>, Timestamp);
value_type!(Uuid, Uuid);
value_type!(serde_json::Value, Json);

impl ValueType for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl<T: ValueType> ValueType for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_from_treats_nulls_as_equal() {
        assert!(!Value::Null.is_distinct_from(&Value::Null));
        assert!(Value::Null.is_distinct_from(&Value::Int(1)));
        assert!(!Value::Int(1).is_distinct_from(&Value::Int(1)));
        assert!(Value::Text("a".into()).is_distinct_from(&Value::Text("b".into())));
    }

    #[test]
    fn parse_identifier_by_column_type() {
        assert_eq!(Value::parse_as(ColumnType::BigInteger, "42"), Some(Value::Int(42)));
        assert_eq!(Value::parse_as(ColumnType::BigInteger, "forty-two"), None);
        assert_eq!(
            Value::parse_as(ColumnType::Text, "abc"),
            Some(Value::Text("abc".into()))
        );
        let id = Uuid::new_v4();
        assert_eq!(
            Value::parse_as(ColumnType::Uuid, &id.to_string()),
            Some(Value::Uuid(id))
        );
    }

    #[test]
    fn option_value_type() {
        assert_eq!(Option::<i64>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<i64>::from_value(&Value::Int(3)), Some(Some(3)));
        assert_eq!(Option::<i64>::from_value(&Value::Text("x".into())), None);
        assert_eq!(None::<String>.into_value(), Value::Null);
    }

    #[test]
    fn int_and_float_compare_but_are_not_equal() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.0)), Some(Ordering::Equal));
        assert_ne!(Value::Int(2), Value::Float(2.0));
    }

    #[test]
    fn typed_nulls_for_sea_query() {
        assert_eq!(
            Value::Null.to_sea_value(Some(ColumnType::BigInteger)),
            sea_query::Value::BigInt(None)
        );
        assert_eq!(
            Value::Int(7).to_sea_value(Some(ColumnType::Integer)),
            sea_query::Value::Int(Some(7))
        );
    }
}

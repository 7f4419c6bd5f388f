//! Partial records for updates and creation.

use std::collections::BTreeMap;

use crate::entity::Row;
use crate::value::Value;

/// A payload field: either set to a value or left alone.
///
/// `Set(Value::Null)` writes NULL; `NotSet` leaves the column untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActiveValue {
    Set(Value),
    #[default]
    NotSet,
}

impl ActiveValue {
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, ActiveValue::Set(_))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ActiveValue::Set(v) => Some(v),
            ActiveValue::NotSet => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            ActiveValue::Set(v) => Some(v),
            ActiveValue::NotSet => None,
        }
    }
}

impl From<Value> for ActiveValue {
    fn from(value: Value) -> Self {
        ActiveValue::Set(value)
    }
}

/// Column to [`ActiveValue`] map used for partial updates and partial
/// creation.
///
/// ```
/// use fastgear::repository::Payload;
///
/// let payload = Payload::new().set("name", "renamed").unset("email");
/// let row = payload.to_row();
/// assert_eq!(row.len(), 1);
/// assert!(row.contains("name"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: BTreeMap<String, ActiveValue>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(column.into(), ActiveValue::Set(value.into()));
        self
    }

    pub fn unset(mut self, column: impl Into<String>) -> Self {
        self.fields.insert(column.into(), ActiveValue::NotSet);
        self
    }

    pub fn get(&self, column: &str) -> Option<&ActiveValue> {
        self.fields.get(column)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ActiveValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        !self.fields.values().any(ActiveValue::is_set)
    }

    /// The set fields as a row; `NotSet` fields are left out.
    pub fn to_row(&self) -> Row {
        self.fields
            .iter()
            .filter_map(|(column, value)| value.as_value().map(|v| (column.clone(), v.clone())))
            .collect()
    }
}

impl From<Row> for Payload {
    fn from(row: Row) -> Self {
        Self {
            fields: row
                .iter()
                .map(|(column, value)| (column.to_string(), ActiveValue::Set(value.clone())))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Payload::new(), |payload, (k, v)| payload.set(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted() {
        let payload = Payload::new().set("a", 1i64).unset("b").set("c", Value::Null);
        let row = payload.to_row();
        assert_eq!(row.len(), 2);
        assert_eq!(row.value("c"), &Value::Null);
        assert!(!row.contains("b"));
        assert!(!payload.is_empty());
        assert!(Payload::new().unset("b").is_empty());
    }

    #[test]
    fn later_writes_win() {
        let payload = Payload::new().set("a", 1i64).unset("a");
        assert_eq!(payload.get("a"), Some(&ActiveValue::NotSet));
        let payload: Payload = [("a", 1i64), ("a", 2i64)].into_iter().collect();
        assert_eq!(payload.to_row().value("a"), &Value::Int(2));
    }
}

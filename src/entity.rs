//! Rows and the `Entity` trait.
//!
//! A [`Row`] is what sessions return: column name to [`Value`], plus any
//! related rows attached by eager loading. Entities are typed views over
//! rows.

use std::collections::BTreeMap;

use crate::error::{FastgearError, Result};
use crate::schema::TableDef;
use crate::value::{Value, ValueType};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
    related: BTreeMap<String, Vec<Row>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Row::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// The column value, or `NULL` when the column is absent.
    pub fn value(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Decodes a column into `T`.
    ///
    /// A missing column decodes as `NULL`, so `Option<T>` fields tolerate
    /// projections that left them out.
    pub fn get_as<T: ValueType>(&self, column: &str) -> Result<T> {
        let value = self.value(column);
        T::from_value(value).ok_or_else(|| {
            FastgearError::Decode(format!(
                "column \"{column}\" holds {value:?}, which does not decode as {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrites this row's columns with those of `other`.
    pub fn merge(&mut self, other: Row) {
        self.values.extend(other.values);
        self.related.extend(other.related);
    }

    /// Keeps only the listed columns.
    pub fn project(&mut self, columns: &[String]) {
        self.values.retain(|k, _| columns.iter().any(|c| c == k));
    }

    pub fn related(&self, name: &str) -> &[Row] {
        self.related.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn attach(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.related.insert(name.into(), rows);
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

/// A typed record mapped to one table.
///
/// `Default` supplies the starting point when a record is populated from a
/// partial payload; `from_row`/`to_row` convert to and from sessions' rows.
///
/// ```
/// use fastgear::{Entity, Row, Result};
/// use fastgear::schema::{ColumnType, TableDef};
/// use once_cell::sync::Lazy;
///
/// #[derive(Debug, Clone, Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// static TAG: Lazy<TableDef> = Lazy::new(|| {
///     TableDef::new("tag")
///         .column("id", ColumnType::BigInteger)
///         .column("label", ColumnType::Text)
///         .primary_key(["id"])
/// });
///
/// impl Entity for Tag {
///     fn table_def() -> &'static TableDef {
///         &TAG
///     }
///
///     fn from_row(row: &Row) -> Result<Self> {
///         Ok(Self { id: row.get_as("id")?, label: row.get_as("label")? })
///     }
///
///     fn to_row(&self) -> Row {
///         Row::new().with("id", self.id).with("label", self.label.as_str())
///     }
/// }
/// ```
pub trait Entity: Default + Clone + Send + Sync + 'static {
    fn table_def() -> &'static TableDef;

    fn from_row(row: &Row) -> Result<Self>;

    fn to_row(&self) -> Row;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_column_decodes_as_null() {
        let row = Row::new().with("id", 1i64);
        assert_eq!(row.get_as::<i64>("id").unwrap(), 1);
        assert_eq!(row.get_as::<Option<String>>("name").unwrap(), None);
        assert!(matches!(
            row.get_as::<String>("id"),
            Err(FastgearError::Decode(_))
        ));
    }

    #[test]
    fn merge_overrides_and_project_keeps() {
        let mut row = Row::new().with("id", 1i64).with("name", "a");
        row.merge(Row::new().with("name", "b").with("extra", true));
        assert_eq!(row.value("name"), &Value::Text("b".into()));
        row.project(&["id".to_string(), "name".to_string()]);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn related_rows() {
        let mut row: Row = [("id", 1i64)].into_iter().collect();
        assert!(row.related("children").is_empty());
        row.attach("children", vec![Row::new().with("id", 10i64)]);
        assert_eq!(row.related("children").len(), 1);
    }
}

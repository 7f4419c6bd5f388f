//! Filter predicates.
//!
//! A [`Predicate`] is a small boolean expression tree over one table's
//! columns. It renders to a `sea_query::Condition` for SQL sessions and can
//! be evaluated directly against a [`Row`] with SQL three-valued logic.
//!
//! ```
//! use fastgear::query::col;
//!
//! let p = col("age").gte(18).and(col("deleted_at").is_null());
//! ```

use std::cmp::Ordering;

use regex::Regex;
use sea_query::extension::postgres::PgExpr;
use sea_query::{BinOper, Condition, DynIden, Expr, ExprTrait};

use crate::entity::Row;
use crate::error::Result;
use crate::schema::TableDef;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    /// `column IS DISTINCT FROM value`
    DistinctFrom {
        column: String,
        value: Value,
    },
    /// Case-insensitive LIKE on the text rendering of `column`.
    ILike {
        column: String,
        pattern: String,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Starts a predicate on `name`.
pub fn col(name: impl Into<String>) -> Column {
    Column(name.into())
}

pub struct Column(String);

impl Column {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lte, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gte, value)
    }

    pub fn is_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            column: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(self.0)
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull(self.0)
    }

    pub fn distinct_from(self, value: impl Into<Value>) -> Predicate {
        Predicate::DistinctFrom {
            column: self.0,
            value: value.into(),
        }
    }

    pub fn ilike(self, pattern: impl Into<String>) -> Predicate {
        Predicate::ILike {
            column: self.0,
            pattern: pattern.into(),
        }
    }

    /// Case-insensitive substring match.
    pub fn contains(self, needle: &str) -> Predicate {
        self.ilike(format!("%{needle}%"))
    }
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::All(mut parts) => {
                parts.push(other);
                Predicate::All(parts)
            }
            first => Predicate::All(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Any(mut parts) => {
                parts.push(other);
                Predicate::Any(parts)
            }
            first => Predicate::Any(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Calls `f` with every column the predicate mentions.
    pub fn visit_columns<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::DistinctFrom { column, .. }
            | Predicate::ILike { column, .. } => f(column),
            Predicate::IsNull(column) | Predicate::IsNotNull(column) => f(column),
            Predicate::All(parts) | Predicate::Any(parts) => {
                for part in parts {
                    part.visit_columns(f);
                }
            }
            Predicate::Not(inner) => inner.visit_columns(f),
        }
    }

    /// Fails with `MissingColumn` if a referenced column is not on `table`.
    pub fn validate(&self, table: &TableDef) -> Result<()> {
        let mut missing = None;
        self.visit_columns(&mut |c| {
            if missing.is_none() && !table.has_column(c) {
                missing = Some(c.to_string());
            }
        });
        match missing {
            Some(column) => Err(crate::error::FastgearError::missing_column(
                table.entity_name(),
                column,
            )),
            None => Ok(()),
        }
    }

    /// Renders into a sea-query condition, binding values with the column's
    /// type.
    pub fn to_condition(&self, table: &TableDef) -> Result<Condition> {
        self.validate(table)?;
        Ok(self.render(table))
    }

    fn render(&self, table: &TableDef) -> Condition {
        let sea = |column: &str, value: &Value| value.to_sea_value(table.column_type(column));
        match self {
            Predicate::Compare { column, op, value } => {
                let c = Expr::col(iden(column));
                let v = sea(column, value);
                let expr = match op {
                    CompareOp::Eq => c.eq(v),
                    CompareOp::Ne => c.ne(v),
                    CompareOp::Lt => c.lt(v),
                    CompareOp::Lte => c.lte(v),
                    CompareOp::Gt => c.gt(v),
                    CompareOp::Gte => c.gte(v),
                };
                Condition::all().add(expr)
            }
            Predicate::In { column, values } => {
                let values: Vec<sea_query::Value> =
                    values.iter().map(|v| sea(column, v)).collect();
                Condition::all().add(Expr::col(iden(column)).is_in(values))
            }
            Predicate::IsNull(column) => Condition::all().add(Expr::col(iden(column)).is_null()),
            Predicate::IsNotNull(column) => {
                Condition::all().add(Expr::col(iden(column)).is_not_null())
            }
            Predicate::DistinctFrom { column, value } => Condition::all().add(
                Expr::col(iden(column))
                    .binary(BinOper::Custom("IS DISTINCT FROM"), sea(column, value)),
            ),
            Predicate::ILike { column, pattern } => Condition::all().add(
                Expr::col(iden(column))
                    .cast_as("TEXT")
                    .ilike(pattern.clone()),
            ),
            Predicate::All(parts) => parts
                .iter()
                .fold(Condition::all(), |cond, p| cond.add(p.render(table))),
            Predicate::Any(parts) => parts
                .iter()
                .fold(Condition::any(), |cond, p| cond.add(p.render(table))),
            Predicate::Not(inner) => inner.render(table).not(),
        }
    }

    /// Evaluates against a row. `None` is SQL `UNKNOWN`.
    pub fn evaluate(&self, row: &Row) -> Option<bool> {
        match self {
            Predicate::Compare { column, op, value } => {
                let current = row.value(column);
                if current.is_null() || value.is_null() {
                    return None;
                }
                let ord = current.compare(value)?;
                Some(match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Ne => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                })
            }
            Predicate::In { column, values } => {
                let current = row.value(column);
                if current.is_null() {
                    return None;
                }
                if values
                    .iter()
                    .any(|v| current.compare(v) == Some(Ordering::Equal))
                {
                    Some(true)
                } else if values.iter().any(Value::is_null) {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::IsNull(column) => Some(row.value(column).is_null()),
            Predicate::IsNotNull(column) => Some(!row.value(column).is_null()),
            Predicate::DistinctFrom { column, value } => {
                Some(row.value(column).is_distinct_from(value))
            }
            Predicate::ILike { column, pattern } => {
                let text = row.value(column).as_text()?;
                like_regex(pattern).map(|re| re.is_match(&text))
            }
            Predicate::All(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.evaluate(row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Predicate::Any(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.evaluate(row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Predicate::Not(inner) => inner.evaluate(row).map(|b| !b),
        }
    }

    /// `true` only when the predicate evaluates to `TRUE`.
    pub fn matches(&self, row: &Row) -> bool {
        self.evaluate(row) == Some(true)
    }
}

pub(crate) fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

/// Case-insensitive regex for a LIKE pattern (`%`, `_`, `\` escapes).
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    re.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

#[cfg(test)]
mod tests {
    use super::{col, iden, Row, TableDef, Value};
    use crate::schema::ColumnType;
    use sea_query::{PostgresQueryBuilder, Query};

    fn table() -> TableDef {
        TableDef::new("person")
            .column("id", ColumnType::BigInteger)
            .column("name", ColumnType::Text)
            .column("deleted_at", ColumnType::Timestamp)
            .primary_key(["id"])
    }

    fn row() -> Row {
        Row::new().with("id", 7i64).with("name", "Ada Lovelace")
    }

    #[test]
    fn three_valued_logic() {
        let r = row();
        assert_eq!(col("id").eq(7i64).evaluate(&r), Some(true));
        assert_eq!(col("deleted_at").eq(Value::Null).evaluate(&r), None);
        assert_eq!(
            col("id").eq(1i64).or(col("deleted_at").gt(0i64)).evaluate(&r),
            None
        );
        assert_eq!(
            col("id").eq(1i64).and(col("deleted_at").gt(0i64)).evaluate(&r),
            Some(false)
        );
        assert!(col("deleted_at").is_null().matches(&r));
        assert!(!col("id").is_in(Vec::<i64>::new()).matches(&r));
    }

    #[test]
    fn ilike_matches_case_insensitive_substring() {
        let r = row();
        assert!(col("name").contains("love").matches(&r));
        assert!(col("name").ilike("ada%").matches(&r));
        assert!(!col("name").ilike("ada").matches(&r));
        assert!(col("id").contains("7").matches(&r));
        assert!(col("name").ilike("Ada_Lovelace").matches(&r));
    }

    #[test]
    fn distinct_from_matches_nulls() {
        let r = row();
        assert!(!col("deleted_at").distinct_from(Value::Null).matches(&r));
        assert!(col("name").distinct_from("Grace").matches(&r));
        assert!(!col("name").distinct_from("Ada Lovelace").matches(&r));
    }

    #[test]
    fn renders_postgres_condition() {
        let cond = col("id")
            .eq(7i64)
            .and(col("name").distinct_from("Bob"))
            .to_condition(&table())
            .unwrap();
        let (sql, values) = Query::select()
            .column(iden("id"))
            .from(iden("person"))
            .cond_where(cond)
            .build(PostgresQueryBuilder);
        assert!(sql.contains("\"id\" = $1"), "{sql}");
        assert!(sql.contains("\"name\" IS DISTINCT FROM $2"), "{sql}");
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn renders_search_as_bound_ilike() {
        let cond = col("id").contains("7").to_condition(&table()).unwrap();
        let (sql, values) = Query::select()
            .column(iden("id"))
            .from(iden("person"))
            .cond_where(cond)
            .build(PostgresQueryBuilder);
        assert!(sql.contains("CAST(\"id\" AS TEXT) ILIKE $1"), "{sql}");
        assert!(!sql.contains('?'), "{sql}");
        assert_eq!(values.0, vec![sea_query::Value::from("%7%".to_string())]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let err = col("nope").eq(1i64).to_condition(&table()).unwrap_err();
        assert!(err.is_configuration());
    }
}

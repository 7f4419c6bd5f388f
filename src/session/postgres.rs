//! PostgreSQL session over `may_postgres`.
//!
//! Statements are rendered with sea-query's PostgreSQL builder and their
//! bound values converted to `ToSql` parameters. Nested transactions are
//! savepoints inside a transaction opened on first use.

use chrono::{DateTime, Utc};
use may_postgres::types::ToSql;
use may_postgres::Client;
use sea_query::Values;

use crate::config::DatabaseConfig;
use crate::entity::Row;
use crate::error::{FastgearError, Result};
use crate::metrics::instrument;
use crate::query::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use crate::schema::{ColumnType, TableDef};
use crate::session::{ExecResult, Session};
use crate::value::Value;

pub struct PgSession {
    client: Client,
    in_transaction: bool,
    savepoints: usize,
}

impl PgSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            in_transaction: false,
            savepoints: 0,
        }
    }

    /// Connects to `config.url`.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client = may_postgres::connect(&config.url)?;
        log::debug!("connected to {}", redact(&config.url));
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }

    /// Rolls back the open transaction, savepoints included.
    pub fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.client.execute("ROLLBACK", &[])?;
        }
        self.in_transaction = false;
        self.savepoints = 0;
        Ok(())
    }

    fn query_rows(&self, sql: &str, values: &Values) -> Result<Vec<may_postgres::Row>> {
        with_converted_params(values, |params| Ok(self.client.query(sql, params)?))
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64> {
        with_converted_params(values, |params| Ok(self.client.execute(sql, params)?))
    }
}

/// Hides the password of a connection string in log output.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            let credentials = &url[scheme + 3..at];
            match credentials.split_once(':') {
                Some((user, _)) => format!("{}{user}:***{}", &url[..scheme + 3], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

/// Converts sea-query values into owned `ToSql` parameters and runs `f`
/// with references to them.
fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R>,
{
    let mut owned: Vec<Box<dyn ToSql>> = Vec::with_capacity(values.0.len());
    for value in values.iter() {
        owned.push(to_sql(value)?);
    }
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref()).collect();
    f(&params)
}

fn to_sql(value: &sea_query::Value) -> Result<Box<dyn ToSql>> {
    use sea_query::Value as V;

    Ok(match value {
        V::Bool(b) => Box::new(*b),
        V::TinyInt(i) => Box::new(i.map(i32::from)),
        V::SmallInt(i) => Box::new(i.map(i32::from)),
        V::Int(i) => Box::new(*i),
        V::BigInt(i) => Box::new(*i),
        V::TinyUnsigned(u) => Box::new(u.map(i32::from)),
        V::SmallUnsigned(u) => Box::new(u.map(i32::from)),
        V::Unsigned(u) => Box::new(u.map(i64::from)),
        V::BigUnsigned(u) => match u {
            Some(u) => Box::new(Some(i64::try_from(*u).map_err(|_| {
                FastgearError::Database(format!("value {u} exceeds the BIGINT range"))
            })?)),
            None => Box::new(None::<i64>),
        },
        V::Float(f) => Box::new(f.map(f64::from)),
        V::Double(d) => Box::new(*d),
        V::String(s) => Box::new(s.as_ref().map(|s| s.to_string())),
        V::Json(j) => Box::new(j.as_ref().map(|j| serde_json::Value::clone(j))),
        V::ChronoDateTimeUtc(d) => Box::new(d.as_ref().map(|d| DateTime::<Utc>::clone(d))),
        V::Uuid(u) => Box::new(u.as_ref().map(|u| uuid::Uuid::clone(u))),
        other => {
            return Err(FastgearError::Database(format!(
                "unsupported value type in query: {other:?}"
            )))
        }
    })
}

fn decode(table: &TableDef, row: &may_postgres::Row) -> Result<Row> {
    let mut decoded = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = match table.column_type(name) {
            Some(ColumnType::Integer) => row.try_get::<_, Option<i32>>(idx).map(Value::from),
            Some(ColumnType::BigInteger) => row.try_get::<_, Option<i64>>(idx).map(Value::from),
            Some(ColumnType::Float) => row.try_get::<_, Option<f64>>(idx).map(Value::from),
            Some(ColumnType::Boolean) => row.try_get::<_, Option<bool>>(idx).map(Value::from),
            Some(ColumnType::Timestamp) => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(Value::from),
            Some(ColumnType::Uuid) => row.try_get::<_, Option<uuid::Uuid>>(idx).map(Value::from),
            Some(ColumnType::Json) => row
                .try_get::<_, Option<serde_json::Value>>(idx)
                .map(Value::from),
            Some(ColumnType::Text) | None => {
                row.try_get::<_, Option<String>>(idx).map(Value::from)
            }
        }
        .map_err(|e| FastgearError::Decode(format!("{}.{name}: {e}", table.name())))?;
        decoded.set(name, value);
    }
    Ok(decoded)
}

impl Session for PgSession {
    fn query(&mut self, statement: &SelectStatement) -> Result<Vec<Row>> {
        let table = statement.table();
        instrument("select", table.name(), || {
            let (sql, values) = statement.build()?;
            self.query_rows(&sql, &values)?
                .iter()
                .map(|row| decode(table, row))
                .collect()
        })
    }

    fn count(&mut self, statement: &SelectStatement) -> Result<u64> {
        instrument("count", statement.table().name(), || {
            let (sql, values) = statement.build_count()?;
            let rows = self.query_rows(&sql, &values)?;
            let count: i64 = match rows.first() {
                Some(row) => row
                    .try_get(0)
                    .map_err(|e| FastgearError::Decode(format!("count: {e}")))?,
                None => 0,
            };
            Ok(count.max(0) as u64)
        })
    }

    fn insert(&mut self, statement: &InsertStatement) -> Result<Vec<Row>> {
        let table = statement.table();
        instrument("insert", table.name(), || {
            if statement.rows().is_empty() {
                return Ok(Vec::new());
            }
            let (sql, values) = statement.build()?;
            self.query_rows(&sql, &values)?
                .iter()
                .map(|row| decode(table, row))
                .collect()
        })
    }

    fn update(&mut self, statement: &UpdateStatement) -> Result<ExecResult> {
        let table = statement.table();
        instrument("update", table.name(), || {
            let (sql, values) = statement.build()?;
            if statement.is_returning() {
                let rows = self
                    .query_rows(&sql, &values)?
                    .iter()
                    .map(|row| decode(table, row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ExecResult {
                    rows_affected: rows.len() as u64,
                    rows,
                })
            } else {
                Ok(ExecResult {
                    rows_affected: self.execute(&sql, &values)?,
                    rows: Vec::new(),
                })
            }
        })
    }

    fn delete(&mut self, statement: &DeleteStatement) -> Result<ExecResult> {
        let table = statement.table();
        instrument("delete", table.name(), || {
            let (sql, values) = statement.build()?;
            if statement.is_returning() {
                let rows = self
                    .query_rows(&sql, &values)?
                    .iter()
                    .map(|row| decode(table, row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ExecResult {
                    rows_affected: rows.len() as u64,
                    rows,
                })
            } else {
                Ok(ExecResult {
                    rows_affected: self.execute(&sql, &values)?,
                    rows: Vec::new(),
                })
            }
        })
    }

    fn begin_nested(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.client.execute("BEGIN", &[])?;
            self.in_transaction = true;
        }
        self.savepoints += 1;
        self.client
            .execute(&format!("SAVEPOINT sp_{}", self.savepoints), &[])?;
        Ok(())
    }

    fn release_nested(&mut self) -> Result<()> {
        if self.savepoints == 0 {
            return Err(FastgearError::Transaction("no savepoint to release".into()));
        }
        self.client
            .execute(&format!("RELEASE SAVEPOINT sp_{}", self.savepoints), &[])?;
        self.savepoints -= 1;
        Ok(())
    }

    fn rollback_nested(&mut self) -> Result<()> {
        if self.savepoints == 0 {
            return Err(FastgearError::Transaction("no savepoint to roll back".into()));
        }
        let savepoint = self.savepoints;
        self.savepoints -= 1;
        self.client
            .execute(&format!("ROLLBACK TO SAVEPOINT sp_{savepoint}"), &[])?;
        Ok(())
    }

    fn in_nested_transaction(&self) -> bool {
        self.savepoints > 0
    }

    fn flush(&mut self) -> Result<()> {
        // Statements are sent as they execute.
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.client.execute("COMMIT", &[])?;
            self.in_transaction = false;
            self.savepoints = 0;
        }
        Ok(())
    }
}

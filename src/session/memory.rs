//! In-memory session.
//!
//! Keeps tables as row vectors and evaluates the statements fastgear builds
//! directly against them. Nested transactions snapshot the tables; `commit`
//! makes the working state the committed one. Every statement is rendered
//! to PostgreSQL first, so an invalid statement fails here as it would on a
//! server, and the rendered SQL is kept in [`MemorySession::executed`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;

use crate::entity::Row;
use crate::error::{FastgearError, Result};
use crate::metrics::instrument;
use crate::query::{
    DeleteStatement, InsertStatement, Order, OrderBy, Predicate, SelectStatement,
    UpdateStatement,
};
use crate::schema::{ColumnType, TableDef};
use crate::session::{AsyncSession, ExecResult, Session};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
struct TableData {
    rows: Vec<Row>,
    next_id: i64,
}

type Tables = BTreeMap<String, TableData>;

#[derive(Debug, Default)]
pub struct MemorySession {
    tables: Tables,
    committed: Tables,
    savepoints: Vec<Tables>,
    executed: Vec<String>,
    rows_written: u64,
    commits: usize,
    flushes: usize,
    failing_tables: HashSet<String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `rows` into `table` and commits them.
    pub fn seed<I>(&mut self, table: &TableDef, rows: I) -> Result<Vec<Row>>
    where
        I: IntoIterator<Item = Row>,
    {
        let statement = rows
            .into_iter()
            .fold(InsertStatement::new(table), InsertStatement::row);
        let inserted = Session::insert(self, &statement)?;
        Session::commit(self)?;
        Ok(inserted)
    }

    /// Every stored row of `table`, deleted ones included, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// The stored row of `table` whose `column` equals `value`.
    pub fn find_row(&self, table: &str, column: &str, value: impl Into<Value>) -> Option<Row> {
        let value = value.into();
        self.tables
            .get(table)?
            .rows
            .iter()
            .find(|r| r.value(column) == &value)
            .cloned()
    }

    /// SQL of every statement executed so far.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Total rows inserted, updated or deleted.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Makes every later update or delete on `table` fail.
    pub fn fail_writes_on(&mut self, table: &str) {
        self.failing_tables.insert(table.to_string());
    }

    /// Discards uncommitted work, open savepoints included.
    pub fn rollback(&mut self) {
        self.tables = self.committed.clone();
        self.savepoints.clear();
    }

    fn check_writable(&self, table: &TableDef) -> Result<()> {
        if self.failing_tables.contains(table.name()) {
            return Err(FastgearError::Database(format!(
                "writes to \"{}\" are failing",
                table.name()
            )));
        }
        Ok(())
    }

    fn matching<'a>(data: &'a [Row], filters: &'a [Predicate]) -> impl Iterator<Item = usize> + 'a {
        data.iter()
            .enumerate()
            .filter(move |(_, row)| filters.iter().all(|p| p.matches(row)))
            .map(|(i, _)| i)
    }

    fn select(&mut self, statement: &SelectStatement) -> Result<Vec<Row>> {
        let (sql, _) = statement.build()?;
        self.executed.push(sql);

        let filters = statement.visible_filters();
        let Some(data) = self.tables.get(statement.table().name()) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<Row> = Self::matching(&data.rows, &filters)
            .map(|i| data.rows[i].clone())
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, statement.order_by()));

        let offset = statement.offset_value().unwrap_or(0) as usize;
        let limit = statement.limit_value().map_or(usize::MAX, |l| l as usize);
        let mut rows: Vec<Row> = rows.into_iter().skip(offset).take(limit).collect();
        if !statement.columns().is_empty() {
            for row in &mut rows {
                row.project(statement.columns());
            }
        }
        Ok(rows)
    }

    fn count_rows(&mut self, statement: &SelectStatement) -> Result<u64> {
        let (sql, _) = statement.build_count()?;
        self.executed.push(sql);

        let filters = statement.visible_filters();
        Ok(self
            .tables
            .get(statement.table().name())
            .map_or(0, |data| Self::matching(&data.rows, &filters).count()) as u64)
    }

    fn insert_rows(&mut self, statement: &InsertStatement) -> Result<Vec<Row>> {
        let (sql, _) = statement.build()?;
        self.executed.push(sql);

        let table = statement.table();
        let serial_pk = match table.single_primary_key() {
            Ok(pk) if matches!(pk.column_type, ColumnType::Integer | ColumnType::BigInteger) => {
                Some(pk.name.clone())
            }
            _ => None,
        };
        let pk_columns = table.primary_key_columns().to_vec();

        let data = self.tables.entry(table.name().to_string()).or_insert_with(|| TableData {
            rows: Vec::new(),
            next_id: 1,
        });
        let mut staged = data.clone();
        let mut inserted = Vec::with_capacity(statement.rows().len());
        for source in statement.rows() {
            let mut row = Row::new();
            for column in table.columns() {
                row.set(column.name.clone(), source.value(&column.name).clone());
            }
            if let Some(pk) = &serial_pk {
                match row.value(pk) {
                    Value::Null => {
                        row.set(pk.clone(), staged.next_id);
                        staged.next_id += 1;
                    }
                    Value::Int(id) => staged.next_id = staged.next_id.max(id + 1),
                    _ => {}
                }
            }
            if !pk_columns.is_empty()
                && staged
                    .rows
                    .iter()
                    .any(|r| pk_columns.iter().all(|c| r.value(c) == row.value(c)))
            {
                return Err(FastgearError::Database(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table.name()
                )));
            }
            staged.rows.push(row.clone());
            inserted.push(row);
        }
        *data = staged;
        self.rows_written += inserted.len() as u64;
        Ok(inserted)
    }

    fn update_rows(&mut self, statement: &UpdateStatement) -> Result<ExecResult> {
        let (sql, _) = statement.build()?;
        self.check_writable(statement.table())?;
        self.executed.push(sql);

        let Some(data) = self.tables.get_mut(statement.table().name()) else {
            return Ok(ExecResult::default());
        };
        let targets: Vec<usize> = Self::matching(&data.rows, statement.filters()).collect();
        let mut result = ExecResult {
            rows_affected: targets.len() as u64,
            rows: Vec::new(),
        };
        for i in targets {
            let row = &mut data.rows[i];
            for (column, value) in statement.assignments() {
                row.set(column.clone(), value.clone());
            }
            if statement.is_returning() {
                result.rows.push(row.clone());
            }
        }
        self.rows_written += result.rows_affected;
        Ok(result)
    }

    fn delete_rows(&mut self, statement: &DeleteStatement) -> Result<ExecResult> {
        let (sql, _) = statement.build()?;
        self.check_writable(statement.table())?;
        self.executed.push(sql);

        let Some(data) = self.tables.get_mut(statement.table().name()) else {
            return Ok(ExecResult::default());
        };
        let filters = statement.filters();
        let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(&mut data.rows)
            .into_iter()
            .partition(|row| filters.iter().all(|p| p.matches(row)));
        data.rows = kept;

        let rows_affected = removed.len() as u64;
        self.rows_written += rows_affected;
        Ok(ExecResult {
            rows_affected,
            rows: if statement.is_returning() { removed } else { Vec::new() },
        })
    }
}

/// PostgreSQL ordering: NULLs sort last ascending and first descending.
fn compare_rows(a: &Row, b: &Row, order_by: &[OrderBy]) -> Ordering {
    for order in order_by {
        let (x, y) = (a.value(&order.column), b.value(&order.column));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.compare(y).unwrap_or(Ordering::Equal),
        };
        let ord = match order.order {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl Session for MemorySession {
    fn query(&mut self, statement: &SelectStatement) -> Result<Vec<Row>> {
        instrument("select", statement.table().name(), || self.select(statement))
    }

    fn count(&mut self, statement: &SelectStatement) -> Result<u64> {
        instrument("count", statement.table().name(), || self.count_rows(statement))
    }

    fn insert(&mut self, statement: &InsertStatement) -> Result<Vec<Row>> {
        instrument("insert", statement.table().name(), || self.insert_rows(statement))
    }

    fn update(&mut self, statement: &UpdateStatement) -> Result<ExecResult> {
        instrument("update", statement.table().name(), || self.update_rows(statement))
    }

    fn delete(&mut self, statement: &DeleteStatement) -> Result<ExecResult> {
        instrument("delete", statement.table().name(), || self.delete_rows(statement))
    }

    fn begin_nested(&mut self) -> Result<()> {
        self.savepoints.push(self.tables.clone());
        self.executed.push(format!("SAVEPOINT sp_{}", self.savepoints.len()));
        Ok(())
    }

    fn release_nested(&mut self) -> Result<()> {
        let depth = self.savepoints.len();
        self.savepoints
            .pop()
            .ok_or_else(|| FastgearError::Transaction("no savepoint to release".into()))?;
        self.executed.push(format!("RELEASE SAVEPOINT sp_{depth}"));
        Ok(())
    }

    fn rollback_nested(&mut self) -> Result<()> {
        let depth = self.savepoints.len();
        self.tables = self
            .savepoints
            .pop()
            .ok_or_else(|| FastgearError::Transaction("no savepoint to roll back".into()))?;
        self.executed.push(format!("ROLLBACK TO SAVEPOINT sp_{depth}"));
        Ok(())
    }

    fn in_nested_transaction(&self) -> bool {
        !self.savepoints.is_empty()
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.savepoints.clear();
        self.committed = self.tables.clone();
        self.commits += 1;
        self.executed.push("COMMIT".to_string());
        Ok(())
    }
}

impl AsyncSession for MemorySession {
    fn query(
        &mut self,
        statement: &SelectStatement,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move { Session::query(self, statement) }
    }

    fn count(&mut self, statement: &SelectStatement) -> impl Future<Output = Result<u64>> + Send {
        async move { Session::count(self, statement) }
    }

    fn insert(
        &mut self,
        statement: &InsertStatement,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move { Session::insert(self, statement) }
    }

    fn update(
        &mut self,
        statement: &UpdateStatement,
    ) -> impl Future<Output = Result<ExecResult>> + Send {
        async move { Session::update(self, statement) }
    }

    fn delete(
        &mut self,
        statement: &DeleteStatement,
    ) -> impl Future<Output = Result<ExecResult>> + Send {
        async move { Session::delete(self, statement) }
    }

    fn begin_nested(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { Session::begin_nested(self) }
    }

    fn release_nested(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { Session::release_nested(self) }
    }

    fn rollback_nested(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { Session::rollback_nested(self) }
    }

    fn in_nested_transaction(&self) -> bool {
        Session::in_nested_transaction(self)
    }

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { Session::flush(self) }
    }

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { Session::commit(self) }
    }
}

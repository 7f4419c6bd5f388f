//! Statements produced by the constructor and executed by sessions.
//!
//! Each statement keeps its table metadata and filters as [`Predicate`]s, so
//! a session can either render it through sea-query (`build`) or evaluate it
//! directly against rows.

use sea_query::{Asterisk, Condition, Expr, PostgresQueryBuilder, Query, Values};

use crate::entity::Row;
use crate::error::{FastgearError, Result};
use crate::query::options::{Order, OrderBy};
use crate::query::predicate::{iden, Predicate};
use crate::schema::TableDef;
use crate::value::Value;

fn where_condition<'a, I>(table: &TableDef, filters: I) -> Result<Condition>
where
    I: IntoIterator<Item = &'a Predicate>,
{
    filters
        .into_iter()
        .try_fold(Condition::all(), |cond, p| Ok(cond.add(p.to_condition(table)?)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    table: TableDef,
    columns: Vec<String>,
    filters: Vec<Predicate>,
    order_by: Vec<OrderBy>,
    offset: Option<u64>,
    limit: Option<u64>,
    relations: Vec<String>,
    with_deleted: bool,
}

impl SelectStatement {
    /// `SELECT *` over `table` with no clauses.
    pub fn new(table: &TableDef) -> Self {
        Self {
            table: table.clone(),
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            offset: None,
            limit: None,
            relations: Vec::new(),
            with_deleted: false,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn order(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restricts the projection. An empty list means every column.
    pub fn project(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }

    pub fn include_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn with_deleted(&self) -> bool {
        self.with_deleted
    }

    /// The marker column hidden rows are filtered on, if any applies.
    pub fn soft_delete_column(&self) -> Option<&str> {
        if self.with_deleted {
            None
        } else {
            self.table.soft_delete_column()
        }
    }

    /// Filters plus `marker IS NULL` when deleted rows are hidden.
    pub fn visible_filters(&self) -> Vec<Predicate> {
        let mut filters = self.filters.clone();
        if let Some(marker) = self.soft_delete_column() {
            filters.push(Predicate::IsNull(marker.to_string()));
        }
        filters
    }

    /// Same statement without ORDER BY, OFFSET and LIMIT.
    pub fn without_paging(&self) -> Self {
        Self {
            order_by: Vec::new(),
            offset: None,
            limit: None,
            ..self.clone()
        }
    }

    pub fn to_sea(&self) -> Result<sea_query::SelectStatement> {
        let mut query = Query::select();
        query.from(iden(self.table.name()));
        if self.columns.is_empty() {
            query.column(Asterisk);
        } else {
            for column in &self.columns {
                self.table.require_column(column)?;
                query.column(iden(column));
            }
        }
        query.cond_where(where_condition(&self.table, &self.visible_filters())?);
        for order in &self.order_by {
            self.table.require_column(&order.column)?;
            let direction = match order.order {
                Order::Asc => sea_query::Order::Asc,
                Order::Desc => sea_query::Order::Desc,
            };
            query.order_by(iden(&order.column), direction);
        }
        if let Some(offset) = self.offset {
            query.offset(offset);
        }
        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        Ok(query)
    }

    pub fn build(&self) -> Result<(String, Values)> {
        Ok(self.to_sea()?.build(PostgresQueryBuilder))
    }

    /// `SELECT COUNT(*)` over the same rows, ignoring paging and ordering.
    pub fn build_count(&self) -> Result<(String, Values)> {
        let mut query = Query::select();
        query
            .expr_as(Expr::cust("COUNT(*)"), iden("count"))
            .from(iden(self.table.name()))
            .cond_where(where_condition(&self.table, &self.visible_filters())?);
        Ok(query.build(PostgresQueryBuilder))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    table: TableDef,
    assignments: Vec<(String, Value)>,
    filters: Vec<Predicate>,
    returning: bool,
}

impl UpdateStatement {
    pub fn new(table: &TableDef) -> Self {
        Self {
            table: table.clone(),
            assignments: Vec::new(),
            filters: Vec::new(),
            returning: false,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Execution returns every updated row.
    pub fn returning_all(mut self) -> Self {
        self.returning = true;
        self
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn is_returning(&self) -> bool {
        self.returning
    }

    pub fn to_sea(&self) -> Result<sea_query::UpdateStatement> {
        let mut query = Query::update();
        query.table(iden(self.table.name()));
        for (column, value) in &self.assignments {
            let column_type = self.table.require_column(column)?.column_type;
            query.value(iden(column), Expr::val(value.to_sea_value(Some(column_type))));
        }
        query.cond_where(where_condition(&self.table, &self.filters)?);
        if self.returning {
            query.returning_col(Asterisk);
        }
        Ok(query)
    }

    pub fn build(&self) -> Result<(String, Values)> {
        Ok(self.to_sea()?.build(PostgresQueryBuilder))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    table: TableDef,
    filters: Vec<Predicate>,
    returning: bool,
}

impl DeleteStatement {
    pub fn new(table: &TableDef) -> Self {
        Self {
            table: table.clone(),
            filters: Vec::new(),
            returning: false,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn returning_all(mut self) -> Self {
        self.returning = true;
        self
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn is_returning(&self) -> bool {
        self.returning
    }

    pub fn to_sea(&self) -> Result<sea_query::DeleteStatement> {
        let mut query = Query::delete();
        query
            .from_table(iden(self.table.name()))
            .cond_where(where_condition(&self.table, &self.filters)?);
        if self.returning {
            query.returning_col(Asterisk);
        }
        Ok(query)
    }

    pub fn build(&self) -> Result<(String, Values)> {
        Ok(self.to_sea()?.build(PostgresQueryBuilder))
    }
}

/// Multi-row insert; always returns the inserted rows.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    table: TableDef,
    rows: Vec<Row>,
}

impl InsertStatement {
    pub fn new(table: &TableDef) -> Self {
        Self {
            table: table.clone(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Columns present in at least one row, in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.table
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| self.rows.iter().any(|r| r.contains(name)))
            .collect()
    }

    pub fn to_sea(&self) -> Result<sea_query::InsertStatement> {
        for row in &self.rows {
            for column in row.columns() {
                self.table.require_column(column)?;
            }
        }
        let columns = self.column_names();
        let mut query = Query::insert();
        query
            .into_table(iden(self.table.name()))
            .columns(columns.iter().map(|c| iden(c)));
        for row in &self.rows {
            let values = columns.iter().map(|c| match row.get(c) {
                Some(value) => Expr::val(value.to_sea_value(self.table.column_type(c))),
                None => Expr::cust("DEFAULT"),
            });
            query
                .values(values)
                .map_err(|e| FastgearError::Database(e.to_string()))?;
        }
        query.returning_col(Asterisk);
        Ok(query)
    }

    pub fn build(&self) -> Result<(String, Values)> {
        Ok(self.to_sea()?.build(PostgresQueryBuilder))
    }
}

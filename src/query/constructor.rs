//! Statement construction.
//!
//! [`StatementConstructor`] turns criteria (an identifier, an options record
//! or an options map) into select, update and delete statements for one
//! table, and pagination requests into [`FindOptions`].

use crate::entity::{Entity, Row};
use crate::error::{FastgearError, Result};
use crate::pagination::{Pagination, PaginationSearch, SearchTerm};
use crate::query::options::{Criteria, DeleteOptions, FindOptions, OrderBy, UpdateOptions};
use crate::query::predicate::{col, Predicate};
use crate::query::statement::{DeleteStatement, SelectStatement, UpdateStatement};
use crate::schema::TableDef;
use crate::value::Value;

#[derive(Debug, Clone, Copy)]
pub struct StatementConstructor<'t> {
    table: &'t TableDef,
}

impl StatementConstructor<'static> {
    pub fn for_entity<E: Entity>() -> Self {
        Self::new(E::table_def())
    }
}

impl<'t> StatementConstructor<'t> {
    pub fn new(table: &'t TableDef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t TableDef {
        self.table
    }

    /// Builds a select over the bound table.
    ///
    /// `Criteria::All` gives an unfiltered, unordered, unlimited select and
    /// `Criteria::ById` one filtered on the primary key only.
    pub fn build_select_statement(
        &self,
        criteria: impl Into<Criteria<FindOptions>>,
    ) -> Result<SelectStatement> {
        let table = self.table;
        let options = match criteria.into() {
            Criteria::All => FindOptions::default(),
            Criteria::ById(id) => FindOptions::new().filter(Self::build_where_from_id(&id, table)?),
            Criteria::Options(options) => options,
            Criteria::Map(map) => FindOptions::try_from(map)?,
        };

        let mut statement = SelectStatement::new(table);
        for predicate in options.filters {
            predicate.validate(table)?;
            statement = statement.filter(predicate);
        }
        for order in options.order_by {
            table.require_column(&order.column)?;
            statement = statement.order(order);
        }
        if let Some(skip) = options.skip {
            statement = statement.offset(skip);
        }
        if let Some(take) = options.take {
            statement = statement.limit(take);
        }
        let mut select = options.select;
        for column in &select {
            table.require_column(column)?;
        }
        for relation in options.relations {
            let join_column = &table.require_relation(&relation)?.from_column;
            // Eager loading reads the join value off every parent row.
            if !select.is_empty() && !select.contains(join_column) {
                select.push(join_column.clone());
            }
            statement = statement.relation(relation);
        }
        Ok(statement
            .project(select)
            .include_deleted(options.with_deleted))
    }

    /// Builds a guarded update setting every payload column.
    ///
    /// The rows must match the criteria and differ from the payload in at
    /// least one column (`a IS DISTINCT FROM $1 OR b IS DISTINCT FROM $2`),
    /// so an update to identical values touches nothing. `target` replaces
    /// the bound table.
    pub fn build_update_statement(
        &self,
        criteria: impl Into<Criteria<UpdateOptions>>,
        payload: &Row,
        target: Option<&TableDef>,
    ) -> Result<UpdateStatement> {
        let table = target.unwrap_or(self.table);
        let filters = match criteria.into() {
            Criteria::All => Vec::new(),
            Criteria::ById(id) => vec![Self::build_where_from_id(&id, table)?],
            Criteria::Options(options) => options.filters,
            Criteria::Map(map) => UpdateOptions::try_from(map)?.filters,
        };

        let mut statement = UpdateStatement::new(table);
        for predicate in filters {
            predicate.validate(table)?;
            statement = statement.filter(predicate);
        }

        let mut guard = Vec::with_capacity(payload.len());
        for (column, value) in payload.iter() {
            table.require_column(column)?;
            guard.push(col(column).distinct_from(value.clone()));
            statement = statement.set(column, value.clone());
        }
        if !guard.is_empty() {
            statement = statement.filter(Predicate::Any(guard));
        }
        Ok(statement)
    }

    pub fn build_delete_statement(
        &self,
        criteria: impl Into<Criteria<DeleteOptions>>,
        target: Option<&TableDef>,
    ) -> Result<DeleteStatement> {
        let table = target.unwrap_or(self.table);
        let filters = match criteria.into() {
            Criteria::All => Vec::new(),
            Criteria::ById(id) => vec![Self::build_where_from_id(&id, table)?],
            Criteria::Options(options) => options.filters,
            Criteria::Map(map) => DeleteOptions::try_from(map)?.filters,
        };

        let mut statement = DeleteStatement::new(table);
        for predicate in filters {
            predicate.validate(table)?;
            statement = statement.filter(predicate);
        }
        Ok(statement)
    }

    /// `pk = id`, with `id` parsed as the primary key's column type.
    pub fn build_where_from_id(id: &str, table: &TableDef) -> Result<Predicate> {
        let pk = table.single_primary_key()?;
        let value = Value::parse_as(pk.column_type, id).ok_or_else(|| {
            FastgearError::InvalidIdentifier {
                column: pk.name.clone(),
                value: id.to_string(),
            }
        })?;
        Ok(col(&pk.name).eq(value))
    }

    /// Converts a page request into find options.
    ///
    /// The 1-based page in `skip` becomes a row offset. Each search term is
    /// a case-insensitive substring match on the column's text; a group of
    /// terms is OR-combined. `columns` naming a relation are eager-loaded,
    /// the rest restrict the projection.
    pub fn build_options(&self, pagination: &Pagination) -> Result<FindOptions> {
        let table = self.table;
        let mut options = FindOptions::new()
            .skip(pagination.offset())
            .take(pagination.take);

        let clause = |term: &SearchTerm| -> Result<Predicate> {
            table.require_column(&term.field)?;
            Ok(col(&term.field).contains(&term.value))
        };
        for search in &pagination.search {
            let mut clauses = match search {
                PaginationSearch::Single(term) => vec![clause(term)?],
                PaginationSearch::Group(terms) => {
                    terms.iter().map(clause).collect::<Result<Vec<_>>>()?
                }
            };
            match clauses.len() {
                0 => continue,
                1 => options.filters.extend(clauses.pop()),
                _ => options.filters.push(Predicate::Any(clauses)),
            }
        }

        if let Some(needle) = pagination.search_all.as_deref().filter(|s| !s.is_empty()) {
            let clauses = table
                .columns()
                .iter()
                .map(|c| col(&c.name).contains(needle))
                .collect();
            options.filters.push(Predicate::Any(clauses));
        }

        for sort in &pagination.sort {
            table.require_column(&sort.field)?;
            options.order_by.push(OrderBy {
                column: sort.field.clone(),
                order: sort.by,
            });
        }

        for field in &pagination.columns {
            if table.relation_def(field).is_some() {
                options.relations.push(field.clone());
            } else {
                table.require_column(field)?;
                options.select.push(field.clone());
            }
        }
        Ok(options)
    }

    /// Collects the mapped items of `fields`: lists are flattened, scalars
    /// kept, and a field with no entry yields its own name.
    pub fn extract_from_mapping(
        mapping: &serde_json::Map<String, serde_json::Value>,
        fields: &[&str],
    ) -> Vec<serde_json::Value> {
        let mut items = Vec::new();
        for field in fields {
            match mapping.get(*field) {
                Some(serde_json::Value::Array(values)) => items.extend(values.iter().cloned()),
                Some(value) => items.push(value.clone()),
                None => items.push(serde_json::Value::String((*field).to_string())),
            }
        }
        items
    }
}

//! Repository facade.
//!
//! [`SyncRepository`] and [`AsyncRepository`] expose the same operations
//! over a [`Session`](crate::session::Session) and an
//! [`AsyncSession`](crate::session::AsyncSession). Both resolve their inputs
//! through the helpers in this module, so only statement execution differs
//! between them.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::entity::{Entity, Row};
use crate::error::{FastgearError, Result};
use crate::query::{
    col, Criteria, DeleteStatement, FindOptions, FindQuery, InsertStatement, NewRecord,
    SelectStatement, StatementConstructor, UpdateOptions, UpdateStatement,
};
use crate::schema::{SchemaGraph, TableDef};

mod async_repository;
mod payload;
mod sync_repository;

pub use async_repository::AsyncRepository;
pub use payload::{ActiveValue, Payload};
pub use sync_repository::SyncRepository;

/// Outcome of an update or soft delete.
///
/// `generated_maps` lists, in order, the tables a soft delete marked rows in.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult<R> {
    pub raw: Vec<R>,
    pub affected: u64,
    pub generated_maps: Vec<String>,
}

impl<R> Default for UpdateResult<R> {
    fn default() -> Self {
        Self {
            raw: Vec::new(),
            affected: 0,
            generated_maps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub raw: Vec<Row>,
    pub affected: u64,
}

/// True when any set field of `payload` differs from `entity`'s value.
pub fn should_be_updated<E: Entity>(entity: &E, payload: &Payload) -> bool {
    let current = entity.to_row();
    payload
        .fields()
        .filter_map(|(column, value)| value.as_value().map(|v| (column, v)))
        .any(|(column, value)| current.value(column) != value)
}

/// Builds `E` from a stored row, columns the row lacks keeping their
/// default values.
pub(crate) fn hydrate<E: Entity>(row: Row) -> Result<E> {
    let mut full = E::default().to_row();
    full.merge(row);
    E::from_row(&full)
}

pub(crate) fn hydrate_all<E: Entity>(rows: Vec<Row>) -> Result<Vec<E>> {
    rows.into_iter().map(hydrate).collect()
}

/// State shared by both repository flavours.
#[derive(Debug)]
pub(crate) struct RepositoryCore<E> {
    pub(crate) graph: Arc<SchemaGraph>,
    pub(crate) config: RepositoryConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for RepositoryCore<E> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            config: self.config.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> RepositoryCore<E> {
    pub(crate) fn new(graph: Arc<SchemaGraph>, config: RepositoryConfig) -> Result<Self> {
        graph.require(E::table_def().name())?;
        Ok(Self {
            graph,
            config,
            _entity: PhantomData,
        })
    }

    pub(crate) fn table(&self) -> &'static TableDef {
        E::table_def()
    }

    pub(crate) fn constructor(&self) -> StatementConstructor<'static> {
        StatementConstructor::for_entity::<E>()
    }

    pub(crate) fn not_found(&self) -> FastgearError {
        let entity = self.table().entity_name();
        log::debug!(
            "Could not find any entity of type \"{entity}\" that matches with the search filter"
        );
        FastgearError::not_found(entity)
    }

    /// One insert for all records. Null primary keys, and for payloads any
    /// primary key they do not set, are left to the database.
    pub(crate) fn insert_statement<I, R>(&self, records: I) -> InsertStatement
    where
        I: IntoIterator<Item = R>,
        R: Into<NewRecord<E>>,
    {
        let table = self.table();
        records
            .into_iter()
            .map(|record| {
                let (mut row, explicit) = match record.into() {
                    NewRecord::Entity(entity) => (entity.to_row(), None),
                    NewRecord::Partial(payload) => {
                        let set = payload.to_row();
                        let mut row = E::default().to_row();
                        row.merge(set.clone());
                        (row, Some(set))
                    }
                };
                let keep: Vec<String> = row
                    .columns()
                    .filter(|c| {
                        let is_pk = table.primary_key_columns().iter().any(|pk| pk == c);
                        let provided = match &explicit {
                            Some(set) => set.contains(c),
                            None => !row.value(c).is_null(),
                        };
                        !is_pk || provided
                    })
                    .map(str::to_string)
                    .collect();
                row.project(&keep);
                row
            })
            .fold(InsertStatement::new(table), InsertStatement::row)
    }

    pub(crate) fn select(&self, query: FindQuery) -> Result<SelectStatement> {
        let constructor = self.constructor();
        match query {
            FindQuery::Criteria(criteria) => constructor.build_select_statement(criteria),
            FindQuery::Pagination(pagination) => {
                constructor.build_select_statement(constructor.build_options(&pagination)?)
            }
            FindQuery::Statement(statement) => Ok(statement),
        }
    }

    /// Select for `find_one`: at most one row is needed.
    pub(crate) fn select_first(&self, criteria: Criteria<FindOptions>) -> Result<SelectStatement> {
        let statement = self.constructor().build_select_statement(criteria)?;
        Ok(match statement.limit_value() {
            Some(_) => statement,
            None => statement.limit(1),
        })
    }

    /// Select for `find_one_or_fail`: two rows are enough to tell a
    /// duplicate apart.
    pub(crate) fn select_single(&self, criteria: Criteria<FindOptions>) -> Result<SelectStatement> {
        let statement = self.constructor().build_select_statement(criteria)?;
        Ok(match statement.limit_value() {
            Some(limit) if limit < 2 => statement,
            _ => statement.limit(2),
        })
    }

    pub(crate) fn single(&self, mut rows: Vec<Row>) -> Result<Row> {
        if rows.len() > 1 {
            return Err(FastgearError::MultipleFound {
                entity: self.table().entity_name().to_string(),
            });
        }
        rows.pop().ok_or_else(|| self.not_found())
    }

    /// The guarded update, restricted to live rows, and, for telling
    /// "unchanged" from "missing", a select over the same criteria.
    pub(crate) fn update_statements(
        &self,
        criteria: Criteria<UpdateOptions>,
        payload: &Row,
    ) -> Result<(UpdateStatement, SelectStatement)> {
        let constructor = self.constructor();
        let filters = constructor
            .build_update_statement(criteria, &Row::new(), None)?
            .filters()
            .to_vec();
        let mut live = filters.clone();
        if let Some(marker) = self.table().soft_delete_column() {
            live.push(col(marker).is_null());
        }
        let update = constructor
            .build_update_statement(UpdateOptions { filters: live }, payload, None)?
            .returning_all();
        let probe = constructor.build_select_statement(FindOptions {
            filters,
            ..FindOptions::default()
        })?;
        Ok((update, probe))
    }

    /// Delete of exactly the row `row` identifies by primary key.
    pub(crate) fn delete_by_identity(&self, row: &Row) -> Result<DeleteStatement> {
        let table = self.table();
        let pk = table.primary_key_columns();
        if pk.is_empty() {
            return Err(FastgearError::MissingPrimaryKey {
                entity: table.entity_name().to_string(),
            });
        }
        Ok(pk
            .iter()
            .fold(DeleteStatement::new(table), |statement, column| {
                statement.filter(col(column).eq(row.value(column).clone()))
            })
            .returning_all())
    }

    /// Select of the stored row behind `entity`, deleted or not.
    pub(crate) fn refresh_statement(&self, entity: &E) -> Result<SelectStatement> {
        let row = entity.to_row();
        let options = self
            .table()
            .primary_key_columns()
            .iter()
            .fold(FindOptions::new().with_deleted(), |options, column| {
                options.filter(col(column).eq(row.value(column).clone()))
            });
        self.table().single_primary_key()?;
        self.constructor().build_select_statement(options)
    }

    pub(crate) fn marker(&self) -> &str {
        &self.config.soft_delete_column
    }
}

use std::sync::Arc;

use crate::cascade::soft_delete_cascade_from_parent;
use crate::config::RepositoryConfig;
use crate::entity::{Entity, Row};
use crate::error::{FastgearError, Result};
use crate::pagination::{Page, Pagination};
use crate::query::{Criteria, DeleteQuery, FindOptions, FindQuery, NewRecord, UpdateOptions};
use crate::relation::load_related;
use crate::repository::{hydrate, hydrate_all, DeleteResult, Payload, RepositoryCore, UpdateResult};
use crate::schema::SchemaGraph;
use crate::session::{commit_or_flush, Session};

/// Blocking repository for `E`.
///
/// Every operation takes the session to run on; the repository itself only
/// holds the schema graph and configuration.
#[derive(Debug, Clone)]
pub struct SyncRepository<E> {
    core: RepositoryCore<E>,
}

impl<E: Entity> SyncRepository<E> {
    /// Fails when `E`'s table is not part of `graph`.
    pub fn new(graph: Arc<SchemaGraph>, config: RepositoryConfig) -> Result<Self> {
        Ok(Self {
            core: RepositoryCore::new(graph, config)?,
        })
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.core.graph
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.core.config
    }

    pub fn create<S: Session + ?Sized>(
        &self,
        session: &mut S,
        record: impl Into<NewRecord<E>>,
    ) -> Result<E> {
        let mut created = self.create_all(session, [record.into()])?;
        created
            .pop()
            .ok_or_else(|| FastgearError::Database("insert returned no row".into()))
    }

    /// Inserts every record in one statement and flushes.
    pub fn create_all<S, I, R>(&self, session: &mut S, records: I) -> Result<Vec<E>>
    where
        S: Session + ?Sized,
        I: IntoIterator<Item = R>,
        R: Into<NewRecord<E>>,
    {
        let statement = self.core.insert_statement(records);
        if statement.rows().is_empty() {
            return Ok(Vec::new());
        }
        let rows = session.insert(&statement)?;
        session.flush()?;
        hydrate_all(rows)
    }

    pub fn save<S: Session + ?Sized>(&self, session: &mut S) -> Result<()> {
        commit_or_flush(session)
    }

    pub fn find_one<S: Session + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<FindOptions>>,
    ) -> Result<Option<E>> {
        let statement = self.core.select_first(criteria.into())?;
        let mut rows = session.query(&statement)?;
        load_related(session, &self.core.graph, &statement, &mut rows)?;
        rows.into_iter().next().map(hydrate).transpose()
    }

    /// Exactly one match, else `NotFound` or `MultipleFound`.
    pub fn find_one_or_fail<S: Session + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<FindOptions>>,
    ) -> Result<E> {
        let statement = self.core.select_single(criteria.into())?;
        let mut rows = session.query(&statement)?;
        load_related(session, &self.core.graph, &statement, &mut rows)?;
        hydrate(self.core.single(rows)?)
    }

    pub fn find<S: Session + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<FindQuery>,
    ) -> Result<Vec<E>> {
        let statement = self.core.select(query.into())?;
        let mut rows = session.query(&statement)?;
        load_related(session, &self.core.graph, &statement, &mut rows)?;
        hydrate_all(rows)
    }

    /// Rows the query matches, ignoring its paging.
    pub fn count<S: Session + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<FindQuery>,
    ) -> Result<u64> {
        let statement = self.core.select(query.into())?;
        session.count(&statement)
    }

    /// One page of results and the total over all pages.
    pub fn find_and_count<S: Session + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<FindQuery>,
    ) -> Result<(Vec<E>, u64)> {
        let statement = self.core.select(query.into())?;
        let total = session.count(&statement)?;
        let mut rows = session.query(&statement)?;
        load_related(session, &self.core.graph, &statement, &mut rows)?;
        Ok((hydrate_all(rows)?, total))
    }

    pub fn paginate<S: Session + ?Sized>(
        &self,
        session: &mut S,
        pagination: Pagination,
    ) -> Result<Page<E>> {
        let (offset, size) = (pagination.offset(), pagination.take);
        let (items, total) = self.find_and_count(session, pagination)?;
        Ok(Page::from_offset(items, total, offset, size))
    }

    /// Sets the payload's fields on the matching rows that differ from it.
    ///
    /// An empty payload returns a zero result without running anything.
    /// When nothing changed because nothing matched, fails with `NotFound`.
    pub fn update<S: Session + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<UpdateOptions>>,
        payload: impl Into<Payload>,
    ) -> Result<UpdateResult<E>> {
        let changes = payload.into().to_row();
        if changes.is_empty() {
            return Ok(UpdateResult::default());
        }
        let (update, probe) = self.core.update_statements(criteria.into(), &changes)?;
        let outcome = session.update(&update)?;
        if outcome.rows_affected == 0 {
            if session.count(&probe)? == 0 {
                return Err(self.core.not_found());
            }
            return Ok(UpdateResult::default());
        }
        self.save(session)?;
        Ok(UpdateResult {
            raw: hydrate_all(outcome.rows)?,
            affected: outcome.rows_affected,
            generated_maps: Vec::new(),
        })
    }

    /// Runs a prepared delete, or deletes the single row the criteria find.
    pub fn delete<S: Session + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<DeleteQuery>,
    ) -> Result<DeleteResult> {
        let statement = match query.into() {
            DeleteQuery::Statement(statement) => statement,
            DeleteQuery::Criteria(criteria) => {
                let statement = self.core.select_single(criteria)?;
                let row = self.core.single(session.query(&statement)?)?;
                self.core.delete_by_identity(&row)?
            }
        };
        let outcome = session.delete(&statement)?;
        self.save(session)?;
        Ok(DeleteResult {
            affected: outcome.rows_affected,
            raw: outcome.rows,
        })
    }

    /// Soft-deletes the matching rows and their dependents using the
    /// configured marker column.
    pub fn soft_delete<S: Session + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<UpdateOptions>>,
    ) -> Result<UpdateResult<Row>> {
        let marker = self.core.marker().to_string();
        self.soft_delete_with_marker(session, criteria, &marker)
    }

    /// Soft delete inside a savepoint, rolled back if any step fails.
    pub fn soft_delete_with_marker<S: Session + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<UpdateOptions>>,
        marker_column: &str,
    ) -> Result<UpdateResult<Row>> {
        let table = self.core.table();
        session.begin_nested()?;
        let result = soft_delete_cascade_from_parent(
            session,
            &self.core.graph,
            table.name(),
            criteria,
            marker_column,
        );
        match result {
            Ok(result) => {
                session.release_nested()?;
                self.save(session)?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback) = session.rollback_nested() {
                    log::error!("rollback after failed soft delete on {} failed: {rollback}", table.name());
                }
                Err(err)
            }
        }
    }

    /// Reads `entity` again by primary key, soft-deleted or not.
    pub fn refresh<S: Session + ?Sized>(&self, session: &mut S, entity: &E) -> Result<E> {
        let statement = self.core.refresh_statement(entity)?;
        hydrate(self.core.single(session.query(&statement)?)?)
    }
}

use std::sync::Arc;

use crate::cascade::soft_delete_cascade_from_parent_async;
use crate::config::RepositoryConfig;
use crate::entity::{Entity, Row};
use crate::error::{FastgearError, Result};
use crate::pagination::{Page, Pagination};
use crate::query::{Criteria, DeleteQuery, FindOptions, FindQuery, NewRecord, UpdateOptions};
use crate::relation::load_related_async;
use crate::repository::{hydrate, hydrate_all, DeleteResult, Payload, RepositoryCore, UpdateResult};
use crate::schema::SchemaGraph;
use crate::session::{commit_or_flush_async, AsyncSession};

/// Cooperative twin of [`SyncRepository`](crate::repository::SyncRepository).
#[derive(Debug, Clone)]
pub struct AsyncRepository<E> {
    core: RepositoryCore<E>,
}

impl<E: Entity> AsyncRepository<E> {
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

    pub async fn create<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        record: impl Into<NewRecord<E>>,
    ) -> Result<E> {
        let mut created = self.create_all(session, [record.into()]).await?;
        created
            .pop()
            .ok_or_else(|| FastgearError::Database("insert returned no row".into()))
    }

    pub async fn create_all<S, I, R>(&self, session: &mut S, records: I) -> Result<Vec<E>>
    where
        S: AsyncSession + ?Sized,
        I: IntoIterator<Item = R>,
        R: Into<NewRecord<E>>,
    {
        let statement = self.core.insert_statement(records);
        if statement.rows().is_empty() {
            return Ok(Vec::new());
        }
        let rows = session.insert(&statement).await?;
        session.flush().await?;
        hydrate_all(rows)
    }

    pub async fn save<S: AsyncSession + ?Sized>(&self, session: &mut S) -> Result<()> {
        commit_or_flush_async(session).await
    }

    pub async fn find_one<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<FindOptions>>,
    ) -> Result<Option<E>> {
        let statement = self.core.select_first(criteria.into())?;
        let mut rows = session.query(&statement).await?;
        load_related_async(session, &self.core.graph, &statement, &mut rows).await?;
        rows.into_iter().next().map(hydrate).transpose()
    }

    pub async fn find_one_or_fail<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<FindOptions>>,
    ) -> Result<E> {
        let statement = self.core.select_single(criteria.into())?;
        let mut rows = session.query(&statement).await?;
        load_related_async(session, &self.core.graph, &statement, &mut rows).await?;
        hydrate(self.core.single(rows)?)
    }

    pub async fn find<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<FindQuery>,
    ) -> Result<Vec<E>> {
        let statement = self.core.select(query.into())?;
        let mut rows = session.query(&statement).await?;
        load_related_async(session, &self.core.graph, &statement, &mut rows).await?;
        hydrate_all(rows)
    }

    pub async fn count<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<FindQuery>,
    ) -> Result<u64> {
        let statement = self.core.select(query.into())?;
        session.count(&statement).await
    }

    pub async fn find_and_count<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<FindQuery>,
    ) -> Result<(Vec<E>, u64)> {
        let statement = self.core.select(query.into())?;
        let total = session.count(&statement).await?;
        let mut rows = session.query(&statement).await?;
        load_related_async(session, &self.core.graph, &statement, &mut rows).await?;
        Ok((hydrate_all(rows)?, total))
    }

    pub async fn paginate<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        pagination: Pagination,
    ) -> Result<Page<E>> {
        let (offset, size) = (pagination.offset(), pagination.take);
        let (items, total) = self.find_and_count(session, pagination).await?;
        Ok(Page::from_offset(items, total, offset, size))
    }

    pub async fn update<S: AsyncSession + ?Sized>(
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
        let outcome = session.update(&update).await?;
        if outcome.rows_affected == 0 {
            if session.count(&probe).await? == 0 {
                return Err(self.core.not_found());
            }
            return Ok(UpdateResult::default());
        }
        self.save(session).await?;
        Ok(UpdateResult {
            raw: hydrate_all(outcome.rows)?,
            affected: outcome.rows_affected,
            generated_maps: Vec::new(),
        })
    }

    pub async fn delete<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        query: impl Into<DeleteQuery>,
    ) -> Result<DeleteResult> {
        let statement = match query.into() {
            DeleteQuery::Statement(statement) => statement,
            DeleteQuery::Criteria(criteria) => {
                let statement = self.core.select_single(criteria)?;
                let row = self.core.single(session.query(&statement).await?)?;
                self.core.delete_by_identity(&row)?
            }
        };
        let outcome = session.delete(&statement).await?;
        self.save(session).await?;
        Ok(DeleteResult {
            affected: outcome.rows_affected,
            raw: outcome.rows,
        })
    }

    pub async fn soft_delete<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<UpdateOptions>>,
    ) -> Result<UpdateResult<Row>> {
        let marker = self.core.marker().to_string();
        self.soft_delete_with_marker(session, criteria, &marker).await
    }

    pub async fn soft_delete_with_marker<S: AsyncSession + ?Sized>(
        &self,
        session: &mut S,
        criteria: impl Into<Criteria<UpdateOptions>>,
        marker_column: &str,
    ) -> Result<UpdateResult<Row>> {
        let table = self.core.table();
        session.begin_nested().await?;
        let result = soft_delete_cascade_from_parent_async(
            session,
            &self.core.graph,
            table.name(),
            criteria,
            marker_column,
        )
        .await;
        match result {
            Ok(result) => {
                session.release_nested().await?;
                self.save(session).await?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback) = session.rollback_nested().await {
                    log::error!("rollback after failed soft delete on {} failed: {rollback}", table.name());
                }
                Err(err)
            }
        }
    }

    pub async fn refresh<S: AsyncSession + ?Sized>(&self, session: &mut S, entity: &E) -> Result<E> {
        let statement = self.core.refresh_statement(entity)?;
        hydrate(self.core.single(session.query(&statement).await?)?)
    }
}

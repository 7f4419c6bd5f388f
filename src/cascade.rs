//! Cascading soft delete.
//!
//! Marks the rows matching a criteria deleted, then walks the foreign-key
//! graph breadth first and marks every live row that references a row
//! marked in the previous level. All rows get the same timestamp.
//!
//! [`CascadeWalk`] holds the walk's state and hands out the statements to
//! run; [`soft_delete_cascade_from_parent`] and
//! [`soft_delete_cascade_from_parent_async`] only drive it against a
//! session.
//!
//! Tables without the marker column stop the walk: they are neither updated
//! nor traversed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::entity::Row;
use crate::error::{FastgearError, Result};
use crate::metrics::record_soft_deleted;
use crate::query::{
    col, Criteria, SelectStatement, StatementConstructor, UpdateOptions, UpdateStatement,
};
use crate::repository::UpdateResult;
use crate::schema::{SchemaGraph, TableDef, TableId};
use crate::session::{AsyncSession, ExecResult, Session};
use crate::value::Value;

/// Child rows to look up after their parent table was updated.
#[derive(Debug, Clone)]
pub struct ChildLookup {
    child: TableId,
    statement: SelectStatement,
}

impl ChildLookup {
    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }
}

#[derive(Debug)]
pub struct CascadeWalk<'g> {
    graph: &'g SchemaGraph,
    root: TableId,
    marker: String,
    payload: Row,
    root_update: Option<UpdateStatement>,
    current: Vec<(TableId, Vec<Value>)>,
    next: Vec<(TableId, Vec<Value>)>,
    visited: HashSet<TableId>,
    processing: Option<TableId>,
    result: UpdateResult<Row>,
}

impl<'g> CascadeWalk<'g> {
    /// Validates the graph reachable from `root_table` and prepares the
    /// root update. Nothing is written here.
    pub fn new(
        graph: &'g SchemaGraph,
        root_table: &str,
        criteria: Criteria<UpdateOptions>,
        marker_column: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let root = graph.require(root_table)?;
        let table = graph.table(root);
        table.require_column(marker_column)?;
        Self::check_reachable(graph, root, marker_column)?;

        let mut filters = match criteria {
            Criteria::All => Vec::new(),
            Criteria::ById(id) => vec![StatementConstructor::build_where_from_id(&id, table)?],
            Criteria::Options(options) => options.filters,
            Criteria::Map(map) => UpdateOptions::try_from(map)?.filters,
        };
        filters.push(col(marker_column).is_null());

        let payload = Row::new().with(marker_column, now);
        let root_update = StatementConstructor::new(table)
            .build_update_statement(UpdateOptions { filters }, &payload, None)?
            .returning_all();

        Ok(Self {
            graph,
            root,
            marker: marker_column.to_string(),
            payload,
            root_update: Some(root_update),
            current: Vec::new(),
            next: Vec::new(),
            visited: HashSet::from([root]),
            processing: None,
            result: UpdateResult::default(),
        })
    }

    /// Every marker-bearing table the walk can reach needs a single-column key.
    fn check_reachable(graph: &SchemaGraph, root: TableId, marker: &str) -> Result<()> {
        let mut seen = HashSet::from([root]);
        let mut queue = vec![root];
        while let Some(id) = queue.pop() {
            let pk = graph.table(id).single_primary_key()?;
            for edge in graph.referencing(id) {
                if edge.parent_column != pk.name || seen.contains(&edge.child) {
                    continue;
                }
                if graph.table(edge.child).has_column(marker) {
                    seen.insert(edge.child);
                    queue.push(edge.child);
                }
            }
        }
        Ok(())
    }

    fn table(&self, id: TableId) -> &'g TableDef {
        self.graph.table(id)
    }

    /// The next update to run, root first, then level by level.
    pub fn next_update(&mut self) -> Result<Option<UpdateStatement>> {
        if let Some(root) = self.root_update.take() {
            self.processing = Some(self.root);
            return Ok(Some(root));
        }
        if self.current.is_empty() {
            if self.next.is_empty() {
                return Ok(None);
            }
            self.current = std::mem::take(&mut self.next);
            self.current.reverse();
            self.visited.extend(self.current.iter().map(|(id, _)| *id));
        }
        let Some((id, ids)) = self.current.pop() else {
            return Ok(None);
        };
        let table = self.table(id);
        let pk = table.single_primary_key()?;
        let options = UpdateOptions::new()
            .filter(col(&pk.name).is_in(ids))
            .filter(col(&self.marker).is_null());
        let statement = StatementConstructor::new(table)
            .build_update_statement(options, &self.payload, None)?
            .returning_all();
        self.processing = Some(id);
        Ok(Some(statement))
    }

    /// Records the outcome of the last update and returns the child lookups
    /// it calls for.
    pub fn record_update(&mut self, outcome: ExecResult) -> Result<Vec<ChildLookup>> {
        let Some(id) = self.processing.take() else {
            return Err(FastgearError::Transaction(
                "cascade update recorded out of order".into(),
            ));
        };
        let table = self.table(id);
        if outcome.rows_affected == 0 {
            if id == self.root {
                log::debug!(
                    "soft delete on {} matched nothing",
                    table.entity_name()
                );
                return Err(FastgearError::not_found(table.entity_name()));
            }
            return Ok(Vec::new());
        }

        record_soft_deleted(table.name(), outcome.rows_affected);
        self.result.affected += outcome.rows_affected;
        self.result.generated_maps.push(table.name().to_string());

        let pk = table.single_primary_key()?;
        let ids: Vec<Value> = outcome.rows.iter().map(|r| r.value(&pk.name).clone()).collect();
        self.result.raw.extend(outcome.rows);

        let mut lookups = Vec::new();
        for edge in self.graph.referencing(id) {
            let child = self.table(edge.child);
            if edge.parent_column != pk.name {
                log::debug!(
                    "skipping {}.{}: references {}.{}, not the primary key",
                    child.name(),
                    edge.child_column,
                    table.name(),
                    edge.parent_column
                );
                continue;
            }
            if !child.has_column(&self.marker) {
                log::debug!(
                    "cascade stops at {}: no {} column",
                    child.name(),
                    self.marker
                );
                continue;
            }
            if self.visited.contains(&edge.child) {
                continue;
            }
            let child_pk = child.single_primary_key()?;
            let statement = SelectStatement::new(child)
                .filter(col(&edge.child_column).is_in(ids.clone()))
                .filter(col(&self.marker).is_null())
                .project(vec![child_pk.name.clone()])
                .include_deleted(true);
            lookups.push(ChildLookup {
                child: edge.child,
                statement,
            });
        }
        Ok(lookups)
    }

    /// Merges looked-up child keys into the next level.
    pub fn record_children(&mut self, lookup: &ChildLookup, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let pk = self.table(lookup.child).single_primary_key()?;
        let ids = rows.iter().map(|r| r.value(&pk.name).clone());
        match self.next.iter_mut().find(|(id, _)| *id == lookup.child) {
            Some((_, existing)) => {
                for value in ids {
                    if !existing.contains(&value) {
                        existing.push(value);
                    }
                }
            }
            None => {
                let mut unique: Vec<Value> = Vec::new();
                for value in ids {
                    if !unique.contains(&value) {
                        unique.push(value);
                    }
                }
                self.next.push((lookup.child, unique));
            }
        }
        Ok(())
    }

    pub fn finish(self) -> UpdateResult<Row> {
        self.result
    }
}

/// Soft-deletes the `root_table` rows matching `criteria` and, breadth
/// first, every live row depending on them.
///
/// Fails with `NotFound` when no live root row matches. The caller owns the
/// transaction; repositories wrap this in a savepoint.
pub fn soft_delete_cascade_from_parent<S: Session + ?Sized>(
    session: &mut S,
    graph: &SchemaGraph,
    root_table: &str,
    criteria: impl Into<Criteria<UpdateOptions>>,
    marker_column: &str,
) -> Result<UpdateResult<Row>> {
    #[cfg(feature = "tracing")]
    let _span = crate::metrics::tracing_helpers::cascade_span(root_table, marker_column).entered();

    let mut walk = CascadeWalk::new(graph, root_table, criteria.into(), marker_column, Utc::now())?;
    while let Some(update) = walk.next_update()? {
        let outcome = session.update(&update)?;
        for lookup in walk.record_update(outcome)? {
            let rows = session.query(lookup.statement())?;
            walk.record_children(&lookup, rows)?;
        }
    }
    Ok(walk.finish())
}

/// Cooperative twin of [`soft_delete_cascade_from_parent`].
pub async fn soft_delete_cascade_from_parent_async<S: AsyncSession + ?Sized>(
    session: &mut S,
    graph: &SchemaGraph,
    root_table: &str,
    criteria: impl Into<Criteria<UpdateOptions>>,
    marker_column: &str,
) -> Result<UpdateResult<Row>> {
    let walk = CascadeWalk::new(graph, root_table, criteria.into(), marker_column, Utc::now());
    let run = async move {
        let mut walk = walk?;
        while let Some(update) = walk.next_update()? {
            let outcome = session.update(&update).await?;
            for lookup in walk.record_update(outcome)? {
                let rows = session.query(lookup.statement()).await?;
                walk.record_children(&lookup, rows)?;
            }
        }
        Ok(walk.finish())
    };

    #[cfg(feature = "tracing")]
    let run = tracing::Instrument::instrument(
        run,
        crate::metrics::tracing_helpers::cascade_span(root_table, marker_column),
    );
    run.await
}

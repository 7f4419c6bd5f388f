//! Eager loading of named relations.
//!
//! Uses the "selectinload" strategy: for each relation, collect the parent
//! rows' join values, fetch every related row with one `IN` query, then
//! group the results back onto their parents.

use crate::entity::Row;
use crate::error::Result;
use crate::query::{col, SelectStatement};
use crate::schema::{RelationDef, SchemaGraph, TableDef};
use crate::session::{AsyncSession, Session};
use crate::value::Value;

/// One `IN` query per relation requested by `statement`.
fn lookups(
    graph: &SchemaGraph,
    table: &TableDef,
    names: &[String],
    parents: &[Row],
) -> Result<Vec<(RelationDef, Option<SelectStatement>)>> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let relation = table.require_relation(name)?.clone();
        let target = graph.table_by_name(&relation.target_table)?;
        let mut keys: Vec<Value> = Vec::new();
        for parent in parents {
            let key = parent.value(&relation.from_column);
            if !key.is_null() && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        let statement = (!keys.is_empty())
            .then(|| SelectStatement::new(target).filter(col(&relation.to_column).is_in(keys)));
        out.push((relation, statement));
    }
    Ok(out)
}

fn attach(relation: &RelationDef, parents: &mut [Row], related: &[Row]) {
    for parent in parents.iter_mut() {
        let key = parent.value(&relation.from_column);
        let matched: Vec<Row> = if key.is_null() {
            Vec::new()
        } else {
            related
                .iter()
                .filter(|r| r.value(&relation.to_column) == key)
                .cloned()
                .collect()
        };
        parent.attach(relation.name.clone(), matched);
    }
}

/// Attaches every relation `statement` asks for to `rows`.
pub fn load_related<S: Session + ?Sized>(
    session: &mut S,
    graph: &SchemaGraph,
    statement: &SelectStatement,
    rows: &mut [Row],
) -> Result<()> {
    if statement.relations().is_empty() || rows.is_empty() {
        return Ok(());
    }
    for (relation, lookup) in lookups(graph, statement.table(), statement.relations(), rows)? {
        let related = match lookup {
            Some(lookup) => session.query(&lookup)?,
            None => Vec::new(),
        };
        attach(&relation, rows, &related);
    }
    Ok(())
}

pub async fn load_related_async<S: AsyncSession + ?Sized>(
    session: &mut S,
    graph: &SchemaGraph,
    statement: &SelectStatement,
    rows: &mut [Row],
) -> Result<()> {
    if statement.relations().is_empty() || rows.is_empty() {
        return Ok(());
    }
    for (relation, lookup) in lookups(graph, statement.table(), statement.relations(), rows)? {
        let related = match lookup {
            Some(lookup) => session.query(&lookup).await?,
            None => Vec::new(),
        };
        attach(&relation, rows, &related);
    }
    Ok(())
}

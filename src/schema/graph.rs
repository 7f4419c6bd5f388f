//! Foreign-key graph over a fixed set of tables.
//!
//! Tables live in an arena indexed by [`TableId`]; `referenced_by` holds, per
//! table, the incoming foreign-key edges. The graph is built once, validated,
//! and shared behind an `Arc` by repositories and the cascade engine.

use std::collections::HashMap;

use crate::error::{FastgearError, Result};
use crate::schema::TableDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

/// `child.child_column` references `parent.parent_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkEdge {
    pub child: TableId,
    pub child_column: String,
    pub parent_column: String,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    tables: Vec<TableDef>,
    by_name: HashMap<String, TableId>,
    referenced_by: Vec<Vec<FkEdge>>,
}

impl SchemaGraph {
    /// Builds the graph, rejecting duplicate tables and foreign keys that
    /// point at unknown tables or columns.
    pub fn new<I>(tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = TableDef>,
    {
        let mut graph = SchemaGraph::default();
        for table in tables {
            if graph.by_name.contains_key(table.name()) {
                return Err(FastgearError::DuplicateTable(table.name().to_string()));
            }
            let id = TableId(graph.tables.len());
            graph.by_name.insert(table.name().to_string(), id);
            graph.tables.push(table);
            graph.referenced_by.push(Vec::new());
        }

        for (index, table) in graph.tables.iter().enumerate() {
            for fk in table.foreign_keys() {
                table.require_column(&fk.column)?;
                let parent = graph
                    .by_name
                    .get(&fk.references_table)
                    .copied()
                    .filter(|id| graph.tables[id.0].has_column(&fk.references_column))
                    .ok_or_else(|| FastgearError::DanglingForeignKey {
                        table: table.name().to_string(),
                        column: fk.column.clone(),
                        target: format!("{}.{}", fk.references_table, fk.references_column),
                    })?;
                graph.referenced_by[parent.0].push(FkEdge {
                    child: TableId(index),
                    child_column: fk.column.clone(),
                    parent_column: fk.references_column.clone(),
                });
            }
        }

        log::debug!("schema graph built with {} tables", graph.tables.len());
        Ok(graph)
    }

    pub fn lookup(&self, name: &str) -> Option<TableId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<TableId> {
        self.lookup(name)
            .ok_or_else(|| FastgearError::UnknownTable(name.to_string()))
    }

    pub fn table(&self, id: TableId) -> &TableDef {
        &self.tables[id.0]
    }

    pub fn table_by_name(&self, name: &str) -> Result<&TableDef> {
        self.require(name).map(|id| self.table(id))
    }

    /// Incoming foreign-key edges of `id`.
    pub fn referencing(&self, id: TableId) -> &[FkEdge] {
        &self.referenced_by[id.0]
    }

    pub fn tables(&self) -> impl Iterator<Item = (TableId, &TableDef)> {
        self.tables.iter().enumerate().map(|(i, t)| (TableId(i), t))
    }
}

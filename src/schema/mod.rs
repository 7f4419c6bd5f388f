//! Table metadata and the foreign-key graph.

mod graph;
mod table;

pub use graph::{FkEdge, SchemaGraph, TableId};
pub use table::{ColumnDef, ColumnType, ForeignKeyDef, RelationDef, RelationType, TableDef};

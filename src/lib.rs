//! # fastgear
//!
//! Repository building blocks over `sea-query`: typed find/update/delete
//! options, a statement constructor, a cascading soft delete that walks the
//! foreign-key graph breadth first, and blocking and cooperative repository
//! facades.
//!
//! ```
//! use std::sync::Arc;
//!
//! use fastgear::config::RepositoryConfig;
//! use fastgear::repository::SyncRepository;
//! use fastgear::schema::{ColumnType, SchemaGraph, TableDef};
//! use fastgear::session::MemorySession;
//! use fastgear::{row, Entity, Result, Row};
//! use once_cell::sync::Lazy;
//!
//! #[derive(Debug, Clone, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! static USERS: Lazy<TableDef> = Lazy::new(|| {
//!     TableDef::new("users")
//!         .entity("User")
//!         .column("id", ColumnType::BigInteger)
//!         .column("name", ColumnType::Text)
//!         .column("deleted_at", ColumnType::Timestamp)
//!         .primary_key(["id"])
//!         .soft_delete("deleted_at")
//! });
//!
//! impl Entity for User {
//!     fn table_def() -> &'static TableDef {
//!         &USERS
//!     }
//!     fn from_row(row: &Row) -> Result<Self> {
//!         Ok(Self { id: row.get_as("id")?, name: row.get_as("name")? })
//!     }
//!     fn to_row(&self) -> Row {
//!         row! { "id" => self.id, "name" => self.name.clone() }
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let graph = Arc::new(SchemaGraph::new([USERS.clone()])?);
//! let users = SyncRepository::<User>::new(graph, RepositoryConfig::default())?;
//! let mut session = MemorySession::new();
//!
//! let ada = users.create(&mut session, User { id: 1, name: "ada".into() })?;
//! users.soft_delete(&mut session, "1")?;
//! assert!(users.find_one(&mut session, "1")?.is_none());
//! assert_eq!(users.refresh(&mut session, &ada)?.name, "ada");
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod config;
pub mod entity;
pub mod error;
mod macros;
pub mod metrics;
pub mod pagination;
pub mod query;
pub mod relation;
pub mod repository;
pub mod schema;
pub mod session;
pub mod value;

pub use cascade::{soft_delete_cascade_from_parent, soft_delete_cascade_from_parent_async};
pub use config::FastgearConfig;
pub use entity::{Entity, Row};
pub use error::{ErrorKind, FastgearError, Result};
pub use pagination::{Page, Pagination};
pub use query::{col, Criteria, DeleteOptions, FindOptions, OptionsMap, StatementConstructor, UpdateOptions};
pub use repository::{AsyncRepository, DeleteResult, Payload, SyncRepository, UpdateResult};
pub use session::{AsyncSession, MemorySession, Session};
pub use value::{Value, ValueType};

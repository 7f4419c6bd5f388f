//! Options, predicates and statements.
//!
//! # Architecture
//!
//! - **Options**: typed records (`FindOptions`, `UpdateOptions`,
//!   `DeleteOptions`), their string-keyed form (`OptionsMap`) and `Criteria`
//! - **Predicate**: filter expressions rendered to sea-query or evaluated on rows
//! - **Statement**: select/insert/update/delete statements executed by sessions
//! - **Constructor**: criteria and pagination to statements
//!
//! # Examples
//!
//! ```
//! use fastgear::query::{col, FindOptions, OrderBy, StatementConstructor};
//! use fastgear::schema::{ColumnType, TableDef};
//!
//! let users = TableDef::new("users")
//!     .column("id", ColumnType::BigInteger)
//!     .column("active", ColumnType::Boolean)
//!     .primary_key(["id"]);
//!
//! let statement = StatementConstructor::new(&users)
//!     .build_select_statement(
//!         FindOptions::new()
//!             .filter(col("active").eq(true))
//!             .order_by(OrderBy::asc("id"))
//!             .take(10),
//!     )
//!     .unwrap();
//! let (sql, _values) = statement.build().unwrap();
//! assert!(sql.starts_with("SELECT * FROM \"users\""));
//! ```

mod constructor;
mod options;
mod predicate;
mod statement;

pub use constructor::StatementConstructor;
pub use options::{
    Criteria, DeleteOptions, DeleteQuery, FindOptions, FindQuery, NewRecord, OptionValue,
    OptionsMap, Order, OrderBy, UpdateOptions,
};
pub use predicate::{col, Column, CompareOp, Predicate};
pub use statement::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};

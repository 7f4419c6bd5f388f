//! Sessions execute statements.
//!
//! [`Session`] is the blocking flavour and [`AsyncSession`] the cooperative
//! one; repositories and the cascade engine are written against these traits
//! and receive the session explicitly on every call.
//!
//! Nested transactions are savepoints: `begin_nested` opens one,
//! `release_nested` keeps its work and `rollback_nested` discards it.
//! `flush` pushes pending work without ending the transaction; `commit`
//! ends it.

use std::future::Future;

use crate::entity::Row;
use crate::error::Result;
use crate::query::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemorySession;
#[cfg(feature = "postgres")]
pub use postgres::PgSession;

/// Outcome of an update or delete.
///
/// `rows` holds the affected rows when the statement asked for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub rows: Vec<Row>,
}

/// Blocking session.
pub trait Session {
    /// Rows of a select, with soft-deleted rows hidden unless the statement
    /// includes them.
    fn query(&mut self, statement: &SelectStatement) -> Result<Vec<Row>>;

    /// Number of rows the select matches, ignoring ordering and paging.
    fn count(&mut self, statement: &SelectStatement) -> Result<u64>;

    /// Inserts and returns the stored rows.
    fn insert(&mut self, statement: &InsertStatement) -> Result<Vec<Row>>;

    fn update(&mut self, statement: &UpdateStatement) -> Result<ExecResult>;

    fn delete(&mut self, statement: &DeleteStatement) -> Result<ExecResult>;

    fn begin_nested(&mut self) -> Result<()>;

    fn release_nested(&mut self) -> Result<()>;

    fn rollback_nested(&mut self) -> Result<()>;

    fn in_nested_transaction(&self) -> bool;

    fn flush(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;
}

/// Cooperative session; same contract as [`Session`].
pub trait AsyncSession: Send {
    fn query(
        &mut self,
        statement: &SelectStatement,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    fn count(&mut self, statement: &SelectStatement) -> impl Future<Output = Result<u64>> + Send;

    fn insert(
        &mut self,
        statement: &InsertStatement,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    fn update(
        &mut self,
        statement: &UpdateStatement,
    ) -> impl Future<Output = Result<ExecResult>> + Send;

    fn delete(
        &mut self,
        statement: &DeleteStatement,
    ) -> impl Future<Output = Result<ExecResult>> + Send;

    fn begin_nested(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn release_nested(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn rollback_nested(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn in_nested_transaction(&self) -> bool;

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Flushes inside a nested transaction, commits otherwise.
pub fn commit_or_flush<S: Session + ?Sized>(session: &mut S) -> Result<()> {
    if session.in_nested_transaction() {
        session.flush()
    } else {
        session.commit()
    }
}

pub async fn commit_or_flush_async<S: AsyncSession + ?Sized>(session: &mut S) -> Result<()> {
    if session.in_nested_transaction() {
        session.flush().await
    } else {
        session.commit().await
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fastgear::config::RepositoryConfig;
use fastgear::schema::{ColumnType, SchemaGraph, TableDef};
use fastgear::{row, Entity, MemorySession, Result, Row, SyncRepository};
use once_cell::sync::Lazy;

pub static PARENT: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("parent")
        .entity("Parent")
        .column("id", ColumnType::BigInteger)
        .column("name", ColumnType::Text)
        .column("deleted_at", ColumnType::Timestamp)
        .primary_key(["id"])
        .soft_delete("deleted_at")
        .has_many("children", "child", "id", "parent_id")
});

pub static CHILD: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("child")
        .entity("Child")
        .column("id", ColumnType::BigInteger)
        .column("parent_id", ColumnType::BigInteger)
        .column("name", ColumnType::Text)
        .column("deleted_at", ColumnType::Timestamp)
        .primary_key(["id"])
        .soft_delete("deleted_at")
        .foreign_key("parent_id", "parent", "id")
        .belongs_to("parent", "parent", "parent_id", "id")
});

pub static SIBLING: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("sibling")
        .column("id", ColumnType::BigInteger)
        .column("parent_id", ColumnType::BigInteger)
        .column("deleted_at", ColumnType::Timestamp)
        .primary_key(["id"])
        .soft_delete("deleted_at")
        .foreign_key("parent_id", "parent", "id")
});

/// References both `child` and `sibling`, so a row can be reached twice in
/// the same level.
pub static GRANDCHILD: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("grandchild")
        .entity("Grandchild")
        .column("id", ColumnType::BigInteger)
        .column("child_id", ColumnType::BigInteger)
        .column("sibling_id", ColumnType::BigInteger)
        .column("deleted_at", ColumnType::Timestamp)
        .primary_key(["id"])
        .soft_delete("deleted_at")
        .foreign_key("child_id", "child", "id")
        .foreign_key("sibling_id", "sibling", "id")
});

/// No marker column: cascades stop here.
pub static AUDIT: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("audit")
        .column("id", ColumnType::BigInteger)
        .column("parent_id", ColumnType::BigInteger)
        .primary_key(["id"])
        .foreign_key("parent_id", "parent", "id")
});

pub static AUDIT_NOTE: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("audit_note")
        .column("id", ColumnType::BigInteger)
        .column("audit_id", ColumnType::BigInteger)
        .column("deleted_at", ColumnType::Timestamp)
        .primary_key(["id"])
        .foreign_key("audit_id", "audit", "id")
});

pub static MEMBERSHIP: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("membership")
        .entity("Membership")
        .column("group_id", ColumnType::BigInteger)
        .column("user_id", ColumnType::BigInteger)
        .column("deleted_at", ColumnType::Timestamp)
        .primary_key(["group_id", "user_id"])
        .soft_delete("deleted_at")
});

/// Soft-deletable with a non-default marker.
pub static TAG: Lazy<TableDef> = Lazy::new(|| {
    TableDef::new("tag")
        .column("id", ColumnType::BigInteger)
        .column("label", ColumnType::Text)
        .column("removed_at", ColumnType::Timestamp)
        .primary_key(["id"])
        .soft_delete("removed_at")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parent {
    pub id: i64,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub children: Vec<Child>,
}

impl Entity for Parent {
    fn table_def() -> &'static TableDef {
        &PARENT
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_as("id")?,
            name: row.get_as("name")?,
            deleted_at: row.get_as("deleted_at")?,
            children: row
                .related("children")
                .iter()
                .map(Child::from_row)
                .collect::<Result<_>>()?,
        })
    }

    fn to_row(&self) -> Row {
        row! {
            "id" => self.id,
            "name" => self.name.clone(),
            "deleted_at" => self.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Child {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Child {
    fn table_def() -> &'static TableDef {
        &CHILD
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_as("id")?,
            parent_id: row.get_as("parent_id")?,
            name: row.get_as::<Option<String>>("name")?.unwrap_or_default(),
            deleted_at: row.get_as("deleted_at")?,
        })
    }

    fn to_row(&self) -> Row {
        row! {
            "id" => self.id,
            "parent_id" => self.parent_id,
            "name" => self.name.clone(),
            "deleted_at" => self.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Membership {
    pub group_id: i64,
    pub user_id: i64,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Membership {
    fn table_def() -> &'static TableDef {
        &MEMBERSHIP
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            group_id: row.get_as("group_id")?,
            user_id: row.get_as("user_id")?,
            deleted_at: row.get_as("deleted_at")?,
        })
    }

    fn to_row(&self) -> Row {
        row! {
            "group_id" => self.group_id,
            "user_id" => self.user_id,
            "deleted_at" => self.deleted_at,
        }
    }
}

pub fn graph() -> Arc<SchemaGraph> {
    Arc::new(
        SchemaGraph::new([
            PARENT.clone(),
            CHILD.clone(),
            SIBLING.clone(),
            GRANDCHILD.clone(),
            AUDIT.clone(),
            AUDIT_NOTE.clone(),
            MEMBERSHIP.clone(),
            TAG.clone(),
        ])
        .unwrap(),
    )
}

pub fn parents() -> SyncRepository<Parent> {
    SyncRepository::new(graph(), RepositoryConfig::default()).unwrap()
}

pub fn children() -> SyncRepository<Child> {
    SyncRepository::new(graph(), RepositoryConfig::default()).unwrap()
}

/// Parent 1 with children 10 and 11, all live.
pub fn scenario() -> MemorySession {
    let mut session = MemorySession::new();
    session
        .seed(&PARENT, [row! { "id" => 1i64, "name" => "root" }])
        .unwrap();
    session
        .seed(
            &CHILD,
            [
                row! { "id" => 10i64, "parent_id" => 1i64, "name" => "a" },
                row! { "id" => 11i64, "parent_id" => 1i64, "name" => "b" },
            ],
        )
        .unwrap();
    session
}

/// The scenario plus grandchildren 100 (under child 10) and 101 (under 11).
pub fn three_levels() -> MemorySession {
    let mut session = scenario();
    session
        .seed(
            &GRANDCHILD,
            [
                row! { "id" => 100i64, "child_id" => 10i64 },
                row! { "id" => 101i64, "child_id" => 11i64 },
            ],
        )
        .unwrap();
    session
}

pub fn marker(session: &MemorySession, table: &str, id: i64) -> Option<DateTime<Utc>> {
    session
        .find_row(table, "id", id)
        .and_then(|row| row.get_as("deleted_at").ok())
        .flatten()
}

//! Static table metadata.
//!
//! A [`TableDef`] describes one mapped table: its columns, primary key,
//! optional soft-delete marker, outgoing foreign keys and named relations.
//! Entities expose theirs through `Entity::table_def`, usually from a
//! `once_cell::sync::Lazy`.
//!
//! ```
//! use fastgear::schema::{ColumnType, TableDef};
//!
//! let child = TableDef::new("child")
//!     .entity("Child")
//!     .column("id", ColumnType::BigInteger)
//!     .column("parent_id", ColumnType::BigInteger)
//!     .column("deleted_at", ColumnType::Timestamp)
//!     .primary_key(["id"])
//!     .soft_delete("deleted_at")
//!     .foreign_key("parent_id", "parent", "id")
//!     .belongs_to("parent", "parent", "parent_id", "id");
//!
//! assert_eq!(child.single_primary_key().unwrap().name, "id");
//! ```

use crate::error::{FastgearError, Result};

/// Storage type of a column, used to coerce identifiers and pick typed nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    BigInteger,
    Float,
    Text,
    Boolean,
    Timestamp,
    Uuid,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// Single-column foreign key `column -> references_table.references_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// Relationship type between two tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    /// One-to-one relationship
    HasOne,
    /// One-to-many relationship
    HasMany,
    /// Many-to-one relationship (belongs_to)
    BelongsTo,
}

/// Named relation used for eager loading.
///
/// Rows of `target_table` whose `to_column` equals this table's
/// `from_column` are attached under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationType,
    pub target_table: String,
    pub from_column: String,
    pub to_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    entity_name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    soft_delete_column: Option<String>,
    foreign_keys: Vec<ForeignKeyDef>,
    relations: Vec<RelationDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entity_name: name.clone(),
            name,
            columns: Vec::new(),
            primary_key: Vec::new(),
            soft_delete_column: None,
            foreign_keys: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Name used in error messages. Defaults to the table name.
    pub fn entity(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = entity_name.into();
        self
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            column_type,
        });
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Declares the column whose non-null value marks a row as deleted.
    /// Selects hide such rows unless `with_deleted` is set.
    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKeyDef {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        });
        self
    }

    pub fn relation(
        mut self,
        name: impl Into<String>,
        kind: RelationType,
        target_table: impl Into<String>,
        from_column: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            kind,
            target_table: target_table.into(),
            from_column: from_column.into(),
            to_column: to_column.into(),
        });
        self
    }

    pub fn has_many(
        self,
        name: impl Into<String>,
        target_table: impl Into<String>,
        from_column: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        self.relation(name, RelationType::HasMany, target_table, from_column, to_column)
    }

    pub fn has_one(
        self,
        name: impl Into<String>,
        target_table: impl Into<String>,
        from_column: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        self.relation(name, RelationType::HasOne, target_table, from_column, to_column)
    }

    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target_table: impl Into<String>,
        from_column: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        self.relation(name, RelationType::BelongsTo, target_table, from_column, to_column)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_def(name).is_some()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_def(name).map(|c| c.column_type)
    }

    pub fn require_column(&self, name: &str) -> Result<&ColumnDef> {
        self.column_def(name)
            .ok_or_else(|| FastgearError::missing_column(&self.entity_name, name))
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    /// The primary key column, rejecting composite and missing keys.
    pub fn single_primary_key(&self) -> Result<&ColumnDef> {
        match self.primary_key.as_slice() {
            [] => Err(FastgearError::MissingPrimaryKey {
                entity: self.entity_name.clone(),
            }),
            [pk] => self.require_column(pk),
            _ => Err(FastgearError::CompositePrimaryKey {
                entity: self.entity_name.clone(),
            }),
        }
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete_column.as_deref()
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyDef] {
        &self.foreign_keys
    }

    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    pub fn relation_def(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn require_relation(&self, name: &str) -> Result<&RelationDef> {
        self.relation_def(name)
            .ok_or_else(|| FastgearError::UnknownRelation {
                entity: self.entity_name.clone(),
                relation: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership() -> TableDef {
        TableDef::new("membership")
            .entity("Membership")
            .column("user_id", ColumnType::BigInteger)
            .column("group_id", ColumnType::BigInteger)
            .primary_key(["user_id", "group_id"])
    }

    #[test]
    fn composite_primary_key_is_rejected() {
        let err = membership().single_primary_key().unwrap_err();
        assert!(matches!(err, FastgearError::CompositePrimaryKey { ref entity } if entity == "Membership"));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let table = TableDef::new("log").column("line", ColumnType::Text);
        assert!(matches!(
            table.single_primary_key(),
            Err(FastgearError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn lookups() {
        let table = membership().has_many("roles", "role", "user_id", "user_id");
        assert_eq!(table.column_type("group_id"), Some(ColumnType::BigInteger));
        assert!(table.require_column("nope").is_err());
        assert_eq!(table.require_relation("roles").unwrap().kind, RelationType::HasMany);
        assert!(table.require_relation("owners").is_err());
        assert_eq!(table.entity_name(), "Membership");
        assert_eq!(TableDef::new("log").entity_name(), "log");
    }
}

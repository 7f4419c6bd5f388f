//! Error type shared by every fastgear operation.
//!
//! Errors fall into a small taxonomy ([`ErrorKind`]) so callers at an HTTP
//! boundary can map them without matching each variant.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FastgearError>;

/// Broad classification of a [`FastgearError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Misconfigured options, schema or entity metadata. A programming error.
    Configuration,
    /// A single-row lookup or soft-delete target matched nothing.
    NotFound,
    /// A single-row lookup matched more than one row.
    Multiplicity,
    /// Caller-supplied input (pagination, identifiers) was rejected.
    BadRequest,
    /// The session failed to execute a statement.
    Database,
    /// A returned row could not be turned into the requested type.
    Decode,
}

#[derive(Debug, Error)]
pub enum FastgearError {
    #[error("Unknown option: {key} in {options}")]
    UnknownOption { key: String, options: &'static str },

    #[error("Option `{key}` in {options} expects {expected}")]
    InvalidOptionValue {
        key: String,
        options: &'static str,
        expected: &'static str,
    },

    #[error("Entity \"{entity}\" has no column named \"{column}\"")]
    MissingColumn { entity: String, column: String },

    #[error("Entity \"{entity}\" has no relation named \"{relation}\"")]
    UnknownRelation { entity: String, relation: String },

    #[error("Entity \"{entity}\" has a composite primary key; only single-column keys are supported")]
    CompositePrimaryKey { entity: String },

    #[error("Entity \"{entity}\" has no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("Unknown table \"{0}\"")]
    UnknownTable(String),

    #[error("Table \"{0}\" is registered twice")]
    DuplicateTable(String),

    #[error("Foreign key {table}.{column} references unknown table or column \"{target}\"")]
    DanglingForeignKey {
        table: String,
        column: String,
        target: String,
    },

    #[error("Could not find any entity of type \"{entity}\" that matches with the search filter")]
    NotFound { entity: String },

    #[error("Expected a single \"{entity}\" but the search filter matched more than one row")]
    MultipleFound { entity: String },

    #[error("Invalid identifier \"{value}\" for column \"{column}\"")]
    InvalidIdentifier { column: String, value: String },

    #[error("Invalid pagination parameter: {0}")]
    InvalidPagination(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] may_postgres::Error),
}

impl FastgearError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn unknown_option(key: impl Into<String>, options: &'static str) -> Self {
        Self::UnknownOption {
            key: key.into(),
            options,
        }
    }

    pub fn missing_column(entity: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            entity: entity.into(),
            column: column.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOption { .. }
            | Self::InvalidOptionValue { .. }
            | Self::MissingColumn { .. }
            | Self::UnknownRelation { .. }
            | Self::CompositePrimaryKey { .. }
            | Self::MissingPrimaryKey { .. }
            | Self::UnknownTable(_)
            | Self::DuplicateTable(_)
            | Self::DanglingForeignKey { .. }
            | Self::Config(_) => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MultipleFound { .. } => ErrorKind::Multiplicity,
            Self::InvalidIdentifier { .. } | Self::InvalidPagination(_) => ErrorKind::BadRequest,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Database(_) | Self::Transaction(_) => ErrorKind::Database,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => ErrorKind::Database,
        }
    }

    /// HTTP status code a web layer would answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Multiplicity => 409,
            ErrorKind::BadRequest => 400,
            ErrorKind::Configuration | ErrorKind::Database | ErrorKind::Decode => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

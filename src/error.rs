//! Error types for schema lookup, query compilation and execution.
//!
//! Every variant is terminal for the query that produced it; nothing in this
//! crate retries. Compilation errors carry the table, column or path involved
//! so a caller can point at the offending part of the join specification.

use thiserror::Error;

use crate::driver::DriverError;
use crate::schema::TableRef;

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid table ref `{0}`, expected `schema.table`")]
    InvalidTableRef(String),

    #[error("Could not find schema {schema}")]
    UnknownSchema { schema: String },

    #[error("Could not find table {table}")]
    UnknownTable { table: TableRef },

    #[error("No relationships found for table {table}")]
    NoRelationships { table: TableRef },

    #[error("Couldn't find a path from {from} to {to}")]
    NoPath { from: TableRef, to: TableRef },

    #[error("Invalid via path ({}) from {from} to {to}: {reason}", join_refs(.via))]
    InvalidWaypoint {
        from: TableRef,
        to: TableRef,
        via: Vec<TableRef>,
        reason: &'static str,
    },

    #[error("Duplicate table ref {table}. Path: {}", join_path(.path))]
    DuplicateTableRef { table: TableRef, path: Vec<TableRef> },

    #[error("Column {table}.{column} does not exist")]
    UnknownColumn { table: TableRef, column: String },

    #[error(
        "Missing 'priority' for orderBy on {join_alias}.{column}; 'priority' must be set when multiple orderBy entries exist in the query"
    )]
    MissingPriority { join_alias: String, column: String },

    #[error("Duplicate 'priority' for orderBy: {priority}")]
    DuplicatePriority { priority: u32 },

    #[error("Could not find a foreign key between {from} and {to}; the schema graph and catalog disagree")]
    NoDirectForeignKey { from: TableRef, to: TableRef },

    #[error("Query selects no columns")]
    EmptySelect,

    #[error("Count query returned no usable `count` column")]
    InvalidCount,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl QueryError {
    /// True for driver connectivity failures, as opposed to a malformed query
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, QueryError::Driver(DriverError::ConnectionFailed(_)))
    }
}

fn join_refs(refs: &[TableRef]) -> String {
    refs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn join_path(refs: &[TableRef]) -> String {
    refs.iter().map(ToString::to_string).collect::<Vec<_>>().join(" > ")
}

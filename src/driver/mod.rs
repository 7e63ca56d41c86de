//! Database drivers.
//!
//! The compiler only needs four capabilities from a database: list every
//! column, list every foreign key, execute a statement, and check that the
//! connection works. Engines plug in by implementing [`DatabaseDriver`].

pub mod fake;
pub mod sqlite;

use thiserror::Error;

use crate::schema::{Relationship, TableColumn};

pub use fake::FakeDriver;
pub use sqlite::SqliteDriver;

/// A result row keyed by output column name, in select order
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub trait DatabaseDriver {
    fn get_all_columns_in_database(&self) -> Result<Vec<TableColumn>, DriverError>;

    fn get_all_foreign_keys_in_database(&self) -> Result<Vec<Relationship>, DriverError>;

    fn exec(&self, sql: &str) -> Result<Vec<Row>, DriverError>;

    fn test_connection(&self) -> Result<(), DriverError>;
}

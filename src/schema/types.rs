use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// A `(schema, table)` pair, written `schema.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableRef {
    pub schema_name: String,
    pub table_name: String,
}

impl TableRef {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}

impl FromStr for TableRef {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
                Ok(TableRef::new(schema, table))
            }
            _ => Err(QueryError::InvalidTableRef(s.to_string())),
        }
    }
}

impl TryFrom<String> for TableRef {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableRef> for String {
    fn from(value: TableRef) -> Self {
        value.to_string()
    }
}

/// Engine-independent column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenericDataType {
    Binary,
    Number,
    Boolean,
    Text,
    Datetime,
    Hierarchical,
    Geometric,
    Money,
    Other,
}

/// Outbound reference from a column to the column it points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyOut {
    pub foreign_table: TableRef,
    pub foreign_column_name: String,
    pub confidence: f64,
    pub has_constraint: bool,
}

/// Inbound reference, recorded on the referenced column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyIn {
    pub local_table: TableRef,
    pub local_column_name: String,
    pub confidence: f64,
    pub has_constraint: bool,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Engine-native type name, e.g. `VARCHAR(255)`
    pub data_type: String,
    pub generic_data_type: GenericDataType,
    pub is_nullable: bool,
    pub included_in_primary_key: bool,
    pub foreign_keys: Vec<ForeignKeyOut>,
    pub foreign_key_references: Vec<ForeignKeyIn>,
}

impl Column {
    /// True if the column takes part in any relationship, in either direction
    pub fn has_relationships(&self) -> bool {
        !self.foreign_keys.is_empty() || !self.foreign_key_references.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseTableInfo {
    pub name: String,
    pub columns: Vec<Column>,
}

impl DatabaseTableInfo {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.included_in_primary_key)
    }

    /// A table with no foreign keys in or out cannot be joined to anything
    pub fn has_relationships(&self) -> bool {
        self.columns.iter().any(Column::has_relationships)
    }

    /// First outbound foreign key pointing at `target`, with the local column name
    pub fn foreign_key_to(&self, target: &TableRef) -> Option<(&str, &ForeignKeyOut)> {
        self.columns.iter().find_map(|column| {
            column
                .foreign_keys
                .iter()
                .find(|fk| &fk.foreign_table == target)
                .map(|fk| (column.name.as_str(), fk))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    pub tables: Vec<DatabaseTableInfo>,
}

/// A column as reported by a driver's catalog query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub schema_name: String,
    pub table_name: String,
    pub name: String,
    pub data_type: String,
    pub generic_data_type: GenericDataType,
    pub is_nullable: bool,
    pub included_in_primary_key: bool,
}

/// A single foreign key as reported by a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub local_table: TableRef,
    pub local_column: String,
    pub foreign_table: TableRef,
    pub foreign_column: String,
}

impl Relationship {
    pub fn new(
        local_table: TableRef,
        local_column: impl Into<String>,
        foreign_table: TableRef,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            local_table,
            local_column: local_column.into(),
            foreign_table,
            foreign_column: foreign_column.into(),
        }
    }
}

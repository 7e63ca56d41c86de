use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde_json::Value;
use std::path::Path;

use super::{DatabaseDriver, DriverError, Row};
use crate::schema::{GenericDataType, Relationship, TableColumn, TableRef};

/// Driver for SQLite database files, including attached schemas
pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Open an existing database file. A missing file is a connection failure,
    /// not an invitation to create an empty database.
    pub fn open(db_path: &Path) -> Result<Self, DriverError> {
        if !db_path.exists() {
            return Err(DriverError::ConnectionFailed(format!(
                "Database file not found: {}",
                db_path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DriverError::ConnectionFailed(e.to_string()))?;

        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, DriverError> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(Self { conn })
    }

    fn schema_names(&self) -> Result<Vec<String>, DriverError> {
        let mut stmt = self.conn.prepare("SELECT name FROM pragma_database_list")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn table_names(&self, schema: &str) -> Result<Vec<String>, DriverError> {
        let sql = format!(
            "SELECT name FROM \"{}\".sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            schema.replace('"', "\"\"")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn primary_key_of(&self, schema: &str, table: &str) -> Result<Option<String>, DriverError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM pragma_table_info(?1, ?2) WHERE pk = 1",
        )?;
        let mut rows = stmt.query(params![table, schema])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl DatabaseDriver for SqliteDriver {
    fn get_all_columns_in_database(&self) -> Result<Vec<TableColumn>, DriverError> {
        let mut columns = Vec::new();

        for schema in self.schema_names()? {
            for table in self.table_names(&schema)? {
                let mut stmt = self.conn.prepare(
                    "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1, ?2) ORDER BY cid",
                )?;
                let rows = stmt.query_map(params![table, schema], |row| {
                    let data_type: String = row.get(1)?;
                    Ok(TableColumn {
                        schema_name: schema.clone(),
                        table_name: table.clone(),
                        name: row.get(0)?,
                        generic_data_type: generic_type_for_declared(&data_type),
                        data_type,
                        is_nullable: row.get::<_, i64>(2)? == 0,
                        included_in_primary_key: row.get::<_, i64>(3)? > 0,
                    })
                })?;

                for column in rows {
                    columns.push(column?);
                }
            }
        }

        debug!("SQLite catalog lists {} columns", columns.len());
        Ok(columns)
    }

    fn get_all_foreign_keys_in_database(&self) -> Result<Vec<Relationship>, DriverError> {
        let mut relationships = Vec::new();

        for schema in self.schema_names()? {
            for table in self.table_names(&schema)? {
                let mut stmt = self.conn.prepare(
                    "SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq",
                )?;
                let keys = stmt
                    .query_map(params![table, schema], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                for (foreign_table, from, to) in keys {
                    // `REFERENCES parent` without a column list targets the parent's primary key
                    let foreign_column = match to {
                        Some(column) => column,
                        None => match self.primary_key_of(&schema, &foreign_table)? {
                            Some(column) => column,
                            None => continue,
                        },
                    };

                    relationships.push(Relationship::new(
                        TableRef::new(schema.as_str(), table.as_str()),
                        from,
                        TableRef::new(schema.as_str(), foreign_table),
                        foreign_column,
                    ));
                }
            }
        }

        Ok(relationships)
    }

    fn exec(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        debug!("Executing SQL: {}", sql);

        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let mut values = Row::new();
            for (idx, name) in names.iter().enumerate() {
                values.insert(name.clone(), json_value(row.get_ref(idx)?));
            }
            result.push(values);
        }

        Ok(result)
    }

    fn test_connection(&self) -> Result<(), DriverError> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| DriverError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(b.to_vec()),
    }
}

/// SQLite column affinity, derived from the declared type name
/// (https://www.sqlite.org/datatype3.html, section 3.1)
#[derive(Debug, Clone, Copy, PartialEq)]
enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

fn affinity_for_type(declared: &str) -> Affinity {
    let declared = declared.to_ascii_uppercase();

    if declared.contains("INT") {
        Affinity::Integer
    } else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT") {
        Affinity::Text
    } else if declared.contains("BLOB") || declared.is_empty() {
        Affinity::Blob
    } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

fn generic_type_for_declared(declared: &str) -> GenericDataType {
    let upper = declared.to_ascii_uppercase();

    // Booleans and dates have NUMERIC affinity but are worth telling apart
    if upper.contains("BOOL") {
        return GenericDataType::Boolean;
    }
    if upper.contains("DATE") || upper.contains("TIME") {
        return GenericDataType::Datetime;
    }

    match affinity_for_type(declared) {
        Affinity::Text => GenericDataType::Text,
        Affinity::Blob => GenericDataType::Binary,
        Affinity::Integer | Affinity::Real | Affinity::Numeric => GenericDataType::Number,
    }
}

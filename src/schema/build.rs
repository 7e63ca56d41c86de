use log::debug;
use std::collections::HashMap;

use super::types::{
    Column, DatabaseSchema, DatabaseTableInfo, ForeignKeyIn, ForeignKeyOut, Relationship,
    TableColumn, TableRef,
};
use crate::driver::DatabaseDriver;
use crate::error::{QueryError, Result};

/// Introspect a database through its driver and build the schema model
pub fn build_schemas(driver: &dyn DatabaseDriver) -> Result<Vec<DatabaseSchema>> {
    let columns = driver.get_all_columns_in_database()?;
    let relationships = driver.get_all_foreign_keys_in_database()?;
    Ok(assemble_schemas(columns, &relationships))
}

/// Group catalog columns by schema and table, attaching both directions of
/// every relationship. Schemas, tables and columns keep the order in which
/// the driver reported them.
pub fn assemble_schemas(
    columns: Vec<TableColumn>,
    relationships: &[Relationship],
) -> Vec<DatabaseSchema> {
    let mut outbound: HashMap<(&TableRef, &str), Vec<ForeignKeyOut>> = HashMap::new();
    let mut inbound: HashMap<(&TableRef, &str), Vec<ForeignKeyIn>> = HashMap::new();

    for rel in relationships {
        outbound
            .entry((&rel.local_table, rel.local_column.as_str()))
            .or_default()
            .push(ForeignKeyOut {
                foreign_table: rel.foreign_table.clone(),
                foreign_column_name: rel.foreign_column.clone(),
                confidence: 1.0,
                has_constraint: true,
            });
        inbound
            .entry((&rel.foreign_table, rel.foreign_column.as_str()))
            .or_default()
            .push(ForeignKeyIn {
                local_table: rel.local_table.clone(),
                local_column_name: rel.local_column.clone(),
                confidence: 1.0,
                has_constraint: true,
            });
    }

    let mut schemas: Vec<DatabaseSchema> = Vec::new();
    let mut table_index: HashMap<TableRef, (usize, usize)> = HashMap::new();

    for column in columns {
        let table_ref = TableRef::new(column.schema_name.as_str(), column.table_name.as_str());

        let (schema_idx, table_idx) = match table_index.get(&table_ref) {
            Some(&idx) => idx,
            None => {
                let schema_idx = match schemas.iter().position(|s| s.name == column.schema_name) {
                    Some(idx) => idx,
                    None => {
                        schemas.push(DatabaseSchema {
                            name: column.schema_name.clone(),
                            tables: Vec::new(),
                        });
                        schemas.len() - 1
                    }
                };
                let tables = &mut schemas[schema_idx].tables;
                tables.push(DatabaseTableInfo {
                    name: column.table_name.clone(),
                    columns: Vec::new(),
                });
                let idx = (schema_idx, tables.len() - 1);
                table_index.insert(table_ref.clone(), idx);
                idx
            }
        };

        let key = (&table_ref, column.name.as_str());
        let foreign_keys = outbound.get(&key).cloned().unwrap_or_default();
        let foreign_key_references = inbound.get(&key).cloned().unwrap_or_default();

        schemas[schema_idx].tables[table_idx].columns.push(Column {
            name: column.name,
            data_type: column.data_type,
            generic_data_type: column.generic_data_type,
            is_nullable: column.is_nullable,
            included_in_primary_key: column.included_in_primary_key,
            foreign_keys,
            foreign_key_references,
        });
    }

    debug!(
        "Built {} schemas with {} tables from {} relationships",
        schemas.len(),
        table_index.len(),
        relationships.len()
    );

    schemas
}

/// Look up a table in the catalog
pub fn find_table<'a>(
    schemas: &'a [DatabaseSchema],
    table_ref: &TableRef,
) -> Result<&'a DatabaseTableInfo> {
    let schema = schemas
        .iter()
        .find(|s| s.name == table_ref.schema_name)
        .ok_or_else(|| QueryError::UnknownSchema {
            schema: table_ref.schema_name.clone(),
        })?;

    schema
        .tables
        .iter()
        .find(|t| t.name == table_ref.table_name)
        .ok_or_else(|| QueryError::UnknownTable {
            table: table_ref.clone(),
        })
}

/// Copy of the catalog without the `ignore`d tables or any foreign key that
/// points at one of them
pub fn without_tables(schemas: &[DatabaseSchema], ignore: &[TableRef]) -> Vec<DatabaseSchema> {
    if ignore.is_empty() {
        return schemas.to_vec();
    }

    schemas
        .iter()
        .map(|schema| DatabaseSchema {
            name: schema.name.clone(),
            tables: schema
                .tables
                .iter()
                .filter(|table| !ignore.contains(&TableRef::new(schema.name.as_str(), table.name.as_str())))
                .map(|table| {
                    let mut table = table.clone();
                    for column in &mut table.columns {
                        column.foreign_keys.retain(|fk| !ignore.contains(&fk.foreign_table));
                        column
                            .foreign_key_references
                            .retain(|fk| !ignore.contains(&fk.local_table));
                    }
                    table
                })
                .collect(),
        })
        .collect()
}

/// Every table in the catalog with its ref, in catalog order
pub fn all_tables(schemas: &[DatabaseSchema]) -> impl Iterator<Item = (TableRef, &DatabaseTableInfo)> {
    schemas.iter().flat_map(|schema| {
        schema
            .tables
            .iter()
            .map(move |table| (TableRef::new(schema.name.as_str(), table.name.as_str()), table))
    })
}

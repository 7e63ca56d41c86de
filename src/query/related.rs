use log::debug;
use serde::Serialize;
use serde_json::Value;

use super::condition::quote_literal;
use super::emit::join_condition;
use super::run::exec_logged;
use crate::driver::{DatabaseDriver, Row};
use crate::error::{QueryError, Result};
use crate::schema::{find_table, shortest_path, DatabaseSchema, SchemaGraph, TableRef};

#[derive(Debug, Clone, Serialize)]
pub struct RelatedRows {
    pub sql: String,
    pub rows: Vec<Row>,
}

/// Rows of `foreign_table` linked to one row of `local_table`, following the
/// shortest foreign-key path between them.
///
/// `local_row` identifies the row by column values; every entry becomes an
/// equality test, and a JSON null becomes `IS NULL`.
pub fn fetch_related_rows(
    driver: &dyn DatabaseDriver,
    schemas: &[DatabaseSchema],
    local_table: &TableRef,
    local_row: &Row,
    foreign_table: &TableRef,
) -> Result<RelatedRows> {
    let local_info = find_table(schemas, local_table)?;
    if !local_info.has_relationships() {
        return Err(QueryError::NoRelationships {
            table: local_table.clone(),
        });
    }
    find_table(schemas, foreign_table)?;

    let path = if local_table == foreign_table {
        vec![local_table.clone()]
    } else {
        let graph = SchemaGraph::new(schemas);
        shortest_path(&graph, local_table, foreign_table)?.nodes
    };

    // Bare table name: SQLite has no `schema.table.*`
    let mut sql = format!("SELECT {}.* FROM {}", foreign_table.table_name, local_table);
    for pair in path.windows(2) {
        let (parent, child) = (&pair[0], &pair[1]);
        let (parent_name, child_name) = (parent.to_string(), child.to_string());
        let on = join_condition(
            schemas,
            (parent, parent_name.as_str()),
            (child, child_name.as_str()),
        )?;
        sql.push_str(&format!(" INNER JOIN {} ON {}", child, on));
    }

    let mut conditions = Vec::with_capacity(local_row.len());
    for (column, value) in local_row {
        if !local_info.has_column(column) {
            return Err(QueryError::UnknownColumn {
                table: local_table.clone(),
                column: column.clone(),
            });
        }
        let test = match value {
            Value::Null => "IS NULL".to_string(),
            Value::String(s) => format!("= {}", quote_literal(s)),
            other => format!("= {}", quote_literal(&other.to_string())),
        };
        conditions.push(format!("{}.{} {}", local_table, column, test));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    debug!("Related rows SQL: {}", sql);

    let rows = exec_logged(driver, &sql)?;
    Ok(RelatedRows { sql, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FakeDriver;
    use crate::schema::{build_schemas, GenericDataType};
    use serde_json::json;

    fn driver() -> FakeDriver {
        let customers = TableRef::new("public", "customers");
        let orders = TableRef::new("public", "orders");
        let fulfilment = TableRef::new("public", "order_fulfilment");
        let audit = TableRef::new("public", "audit_log");

        let mut driver = FakeDriver::new();
        driver
            .define_column(&customers, "id", GenericDataType::Number, true)
            .define_column(&customers, "name", GenericDataType::Text, false)
            .define_column(&orders, "id", GenericDataType::Number, true)
            .define_column(&orders, "customer_id", GenericDataType::Number, false)
            .define_column(&fulfilment, "order_id", GenericDataType::Number, true)
            .define_column(&fulfilment, "status", GenericDataType::Text, false)
            .define_column(&audit, "id", GenericDataType::Number, true)
            .define_relationship(&orders, "customer_id", &customers, "id")
            .define_relationship(&fulfilment, "order_id", &orders, "id");
        driver.mock_exec_response(vec![]);
        driver
    }

    fn local_row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_follows_path_and_filters_on_local_row() {
        let driver = driver();
        let schemas = build_schemas(&driver).unwrap();

        let result = fetch_related_rows(
            &driver,
            &schemas,
            &TableRef::new("public", "customers"),
            &local_row(json!({ "id": 3, "name": "O'Neil" })),
            &TableRef::new("public", "order_fulfilment"),
        )
        .unwrap();

        assert_eq!(
            result.sql,
            "SELECT order_fulfilment.* FROM public.customers \
             INNER JOIN public.orders ON public.orders.customer_id = public.customers.id \
             INNER JOIN public.order_fulfilment ON public.order_fulfilment.order_id = public.orders.id \
             WHERE public.customers.id = '3' AND public.customers.name = 'O''Neil'"
        );
        assert_eq!(driver.executed_sql(), vec![result.sql]);
    }

    #[test]
    fn test_null_value_uses_is_null() {
        let driver = driver();
        let schemas = build_schemas(&driver).unwrap();

        let result = fetch_related_rows(
            &driver,
            &schemas,
            &TableRef::new("public", "order_fulfilment"),
            &local_row(json!({ "status": null })),
            &TableRef::new("public", "orders"),
        )
        .unwrap();

        assert!(result.sql.ends_with("WHERE public.order_fulfilment.status IS NULL"));
    }

    #[test]
    fn test_unrelated_table_has_no_path() {
        let driver = driver();
        let schemas = build_schemas(&driver).unwrap();

        let result = fetch_related_rows(
            &driver,
            &schemas,
            &TableRef::new("public", "customers"),
            &local_row(json!({ "id": 1 })),
            &TableRef::new("public", "audit_log"),
        );
        assert!(matches!(result, Err(QueryError::NoPath { .. })));
        assert!(driver.executed_sql().is_empty());
    }

    #[test]
    fn test_local_table_needs_relationships() {
        let driver = driver();
        let schemas = build_schemas(&driver).unwrap();

        let result = fetch_related_rows(
            &driver,
            &schemas,
            &TableRef::new("public", "audit_log"),
            &local_row(json!({ "id": 1 })),
            &TableRef::new("public", "customers"),
        );
        assert!(matches!(result, Err(QueryError::NoRelationships { .. })));
    }

    #[test]
    fn test_unknown_local_column_is_rejected() {
        let driver = driver();
        let schemas = build_schemas(&driver).unwrap();

        let result = fetch_related_rows(
            &driver,
            &schemas,
            &TableRef::new("public", "customers"),
            &local_row(json!({ "email": "a@b.c" })),
            &TableRef::new("public", "orders"),
        );
        assert!(matches!(result, Err(QueryError::UnknownColumn { .. })));
    }
}

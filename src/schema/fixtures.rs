//! Small catalogs shared by unit tests

use super::build::assemble_schemas;
use super::types::{DatabaseSchema, GenericDataType, Relationship, TableColumn, TableRef};

pub fn table(name: &str) -> TableRef {
    TableRef::new("public", name)
}

pub fn column(table: &str, name: &str, generic_data_type: GenericDataType, pk: bool) -> TableColumn {
    TableColumn {
        schema_name: "public".into(),
        table_name: table.into(),
        name: name.into(),
        data_type: format!("{:?}", generic_data_type).to_lowercase(),
        generic_data_type,
        is_nullable: !pk,
        included_in_primary_key: pk,
    }
}

pub fn relation(local: &str, local_column: &str, foreign: &str, foreign_column: &str) -> Relationship {
    Relationship::new(table(local), local_column, table(foreign), foreign_column)
}

/// customers <- orders <- order_fulfilment, phone_numbers pointing at both
/// customers and orders, a self-referencing employees table and an
/// unrelated audit_log.
pub fn shop() -> Vec<DatabaseSchema> {
    use GenericDataType::{Number, Text};

    let columns = vec![
        column("customers", "id", Number, true),
        column("customers", "name", Text, false),
        column("orders", "id", Number, true),
        column("orders", "customer_id", Number, false),
        column("orders", "total", Number, false),
        column("order_fulfilment", "order_id", Number, true),
        column("order_fulfilment", "status", Text, false),
        column("phone_numbers", "id", Number, true),
        column("phone_numbers", "customer_id", Number, false),
        column("phone_numbers", "order_id", Number, false),
        column("phone_numbers", "number", Text, false),
        column("employees", "id", Number, true),
        column("employees", "manager_id", Number, false),
        column("employees", "name", Text, false),
        column("audit_log", "id", Number, true),
        column("audit_log", "message", Text, false),
    ];

    let relationships = vec![
        relation("orders", "customer_id", "customers", "id"),
        relation("order_fulfilment", "order_id", "orders", "id"),
        relation("phone_numbers", "customer_id", "customers", "id"),
        relation("phone_numbers", "order_id", "orders", "id"),
        relation("employees", "manager_id", "employees", "id"),
    ];

    assemble_schemas(columns, &relationships)
}

/// movies <- movie_actors -> actors
pub fn movies() -> Vec<DatabaseSchema> {
    use GenericDataType::{Number, Text};

    let columns = vec![
        column("movies", "id", Number, true),
        column("movies", "title", Text, false),
        column("actors", "id", Number, true),
        column("actors", "name", Text, false),
        column("movie_actors", "movie_id", Number, true),
        column("movie_actors", "actor_id", Number, true),
    ];

    let relationships = vec![
        relation("movie_actors", "movie_id", "movies", "id"),
        relation("movie_actors", "actor_id", "actors", "id"),
    ];

    assemble_schemas(columns, &relationships)
}

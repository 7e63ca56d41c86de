//! SQL text for a canonical join tree.

use super::types::{JoinTree, PreparedJoin, SortDirection};
use crate::error::{QueryError, Result};
use crate::schema::{find_table, DatabaseSchema, TableRef};

/// Column alias under which a join's column appears in the result set
pub fn output_alias(join_alias: &str, column: &str) -> String {
    format!("{}__{}", join_alias, column)
}

struct SortKey<'a> {
    join_alias: &'a str,
    column: &'a str,
    direction: SortDirection,
    priority: Option<u32>,
}

pub(crate) fn render_sql(schemas: &[DatabaseSchema], tree: &JoinTree) -> Result<String> {
    let order = tree.pre_order();

    let mut selects = Vec::new();
    let mut conditions = Vec::new();
    let mut sort_keys = Vec::new();
    let mut joins = Vec::new();
    let mut group_by = Vec::new();

    for &id in &order {
        let join = tree.get(id);
        let table = find_table(schemas, &join.table_ref)?;
        let alias = join.join_alias.as_str();

        for column in table.columns.iter().filter(|c| join.select.contains(&c.name)) {
            selects.push(format!(
                "{}.{} AS {}",
                alias,
                column.name,
                output_alias(alias, &column.name)
            ));
        }

        if let Some(condition) = &join.condition {
            conditions.push(condition.render(&join.table_ref, table, Some(alias))?);
        }

        for order_by in &join.order_by {
            if !table.has_column(&order_by.column) {
                return Err(QueryError::UnknownColumn {
                    table: join.table_ref.clone(),
                    column: order_by.column.clone(),
                });
            }
            sort_keys.push(SortKey {
                join_alias: alias,
                column: &order_by.column,
                direction: order_by.direction,
                priority: order_by.priority,
            });
        }

        for &child in &join.children {
            joins.push(join_clause(schemas, join, tree.get(child))?);
        }

        for column in table.primary_key_columns() {
            group_by.push(format!("{}.{}", alias, column.name));
        }
    }

    if selects.is_empty() {
        return Err(QueryError::EmptySelect);
    }

    check_priorities(&sort_keys)?;
    // Stable, so equal priorities keep tree order
    sort_keys.sort_by_key(|key| key.priority.unwrap_or(0));

    let root = tree.root();
    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        selects.join(", "),
        root.table_ref,
        root.join_alias
    );

    for clause in &joins {
        sql.push(' ');
        sql.push_str(clause);
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    if !group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_by.join(", "));
    }

    if !sort_keys.is_empty() {
        let keys: Vec<String> = sort_keys
            .iter()
            .map(|key| format!("{}.{} {}", key.join_alias, key.column, key.direction.as_sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    Ok(sql)
}

/// A lone sort key may omit its priority; otherwise all need distinct ones
fn check_priorities(keys: &[SortKey<'_>]) -> Result<()> {
    if keys.len() <= 1 {
        return Ok(());
    }

    let mut seen = Vec::with_capacity(keys.len());
    for key in keys {
        let priority = key.priority.ok_or_else(|| QueryError::MissingPriority {
            join_alias: key.join_alias.to_string(),
            column: key.column.to_string(),
        })?;
        if seen.contains(&priority) {
            return Err(QueryError::DuplicatePriority { priority });
        }
        seen.push(priority);
    }

    Ok(())
}

fn join_clause(schemas: &[DatabaseSchema], parent: &PreparedJoin, child: &PreparedJoin) -> Result<String> {
    let on = join_condition(
        schemas,
        (&parent.table_ref, parent.join_alias.as_str()),
        (&child.table_ref, child.join_alias.as_str()),
    )?;
    Ok(format!(
        "INNER JOIN {} AS {} ON {}",
        child.table_ref, child.join_alias, on
    ))
}

/// `child.col = parent.col` for the foreign key linking two adjacent tables,
/// each given with the name it is qualified by. The parent's own foreign keys
/// are tried first.
pub(crate) fn join_condition(
    schemas: &[DatabaseSchema],
    (parent_ref, parent_qualifier): (&TableRef, &str),
    (child_ref, child_qualifier): (&TableRef, &str),
) -> Result<String> {
    let parent_table = find_table(schemas, parent_ref)?;
    if let Some((local_column, fk)) = parent_table.foreign_key_to(child_ref) {
        return Ok(format!(
            "{}.{} = {}.{}",
            child_qualifier, fk.foreign_column_name, parent_qualifier, local_column
        ));
    }

    let child_table = find_table(schemas, child_ref)?;
    if let Some((local_column, fk)) = child_table.foreign_key_to(parent_ref) {
        return Ok(format!(
            "{}.{} = {}.{}",
            child_qualifier, local_column, parent_qualifier, fk.foreign_column_name
        ));
    }

    Err(QueryError::NoDirectForeignKey {
        from: parent_ref.clone(),
        to: child_ref.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::join_condition;
    use crate::error::QueryError;
    use crate::query::prepare_query;
    use crate::query::types::Query;
    use crate::schema::fixtures::{self, table};
    use serde_json::json;

    fn sql(value: serde_json::Value) -> crate::error::Result<String> {
        let query: Query = serde_json::from_value(value).unwrap();
        prepare_query(&fixtures::shop(), &query).map(|prepared| prepared.sql)
    }

    #[test]
    fn test_multi_hop_query_with_condition() {
        let sql = sql(json!({ "base": {
            "tableRef": "public.customers", "select": "*",
            "where": { "column": "id", "operator": "=", "value": "3" },
            "joins": [{ "tableRef": "public.order_fulfilment", "select": ["status"] }]
        } }))
        .unwrap();

        assert_eq!(
            sql,
            "SELECT public__customers__1.id AS public__customers__1__id, \
             public__customers__1.name AS public__customers__1__name, \
             public__order_fulfilment__1.status AS public__order_fulfilment__1__status \
             FROM public.customers AS public__customers__1 \
             INNER JOIN public.orders AS public__orders__1 ON public__orders__1.customer_id = public__customers__1.id \
             INNER JOIN public.order_fulfilment AS public__order_fulfilment__1 ON public__order_fulfilment__1.order_id = public__orders__1.id \
             WHERE public__customers__1.id = '3' \
             GROUP BY public__customers__1.id, public__orders__1.id, public__order_fulfilment__1.order_id"
        );
    }

    #[test]
    fn test_join_from_referencing_side() {
        let sql = sql(json!({ "base": {
            "tableRef": "public.orders", "select": ["total"],
            "joins": [{ "tableRef": "public.customers", "select": ["name"] }]
        } }))
        .unwrap();

        assert!(sql.contains(
            "INNER JOIN public.customers AS public__customers__1 ON public__customers__1.id = public__orders__1.customer_id"
        ));
    }

    #[test]
    fn test_self_join_uses_self_reference() {
        let sql = sql(json!({ "base": {
            "tableRef": "public.employees", "select": ["name"],
            "joins": [{ "tableRef": "public.employees", "select": ["name"] }]
        } }))
        .unwrap();

        assert!(sql.contains(
            "INNER JOIN public.employees AS public__employees__2 ON public__employees__2.id = public__employees__1.manager_id"
        ));
        assert!(sql.ends_with("GROUP BY public__employees__1.id, public__employees__2.id"));
    }

    #[test]
    fn test_conditions_from_several_joins_are_anded() {
        let sql = sql(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "where": { "operator": "or", "conditions": [
                { "column": "name", "operator": "like", "value": "A%" },
                { "column": "name", "operator": "like", "value": "B%" }
            ] },
            "joins": [{
                "tableRef": "public.orders", "select": [],
                "where": { "column": "total", "operator": ">", "value": "100" }
            }]
        } }))
        .unwrap();

        assert!(sql.contains(
            " WHERE (public__customers__1.name LIKE 'A%' OR public__customers__1.name LIKE 'B%') \
             AND public__orders__1.total > '100' GROUP BY"
        ));
    }

    #[test]
    fn test_order_by_follows_priority() {
        let sql = sql(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "orderBy": [{ "column": "name", "direction": "asc", "priority": 2 }],
            "joins": [{
                "tableRef": "public.orders", "select": ["total"],
                "orderBy": [{ "column": "total", "direction": "desc", "priority": 1 }]
            }]
        } }))
        .unwrap();

        assert!(sql.ends_with(
            " ORDER BY public__orders__1.total DESC, public__customers__1.name ASC"
        ));
    }

    #[test]
    fn test_single_sort_key_needs_no_priority() {
        let sql = sql(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "orderBy": [{ "column": "name", "direction": "desc" }]
        } }))
        .unwrap();

        assert!(sql.ends_with(" ORDER BY public__customers__1.name DESC"));
    }

    #[test]
    fn test_missing_priority_is_rejected() {
        let result = sql(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "orderBy": [
                { "column": "name", "direction": "asc", "priority": 1 },
                { "column": "id", "direction": "asc" }
            ]
        } }));

        match result {
            Err(QueryError::MissingPriority { join_alias, column }) => {
                assert_eq!(join_alias, "public__customers__1");
                assert_eq!(column, "id");
            }
            other => panic!("expected MissingPriority, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_priority_is_rejected() {
        let result = sql(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "orderBy": [{ "column": "name", "direction": "asc", "priority": 1 }],
            "joins": [{
                "tableRef": "public.orders", "select": [],
                "orderBy": [{ "column": "total", "direction": "asc", "priority": 1 }]
            }]
        } }));

        assert!(matches!(result, Err(QueryError::DuplicatePriority { priority: 1 })));
    }

    #[test]
    fn test_unknown_sort_column_is_rejected() {
        let result = sql(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "orderBy": [{ "column": "created_at", "direction": "asc" }]
        } }));

        assert!(matches!(result, Err(QueryError::UnknownColumn { .. })));
    }

    #[test]
    fn test_selecting_nothing_is_rejected() {
        let result = sql(json!({ "base": {
            "tableRef": "public.customers", "select": [],
            "joins": [{ "tableRef": "public.orders", "select": [] }]
        } }));

        assert!(matches!(result, Err(QueryError::EmptySelect)));
    }

    #[test]
    fn test_every_primary_key_is_grouped() {
        let query: Query = serde_json::from_value(json!({ "base": {
            "tableRef": "public.customers", "select": ["name"],
            "joins": [
                { "tableRef": "public.phone_numbers", "select": ["number"] },
                { "tableRef": "public.order_fulfilment", "select": [] }
            ]
        } }))
        .unwrap();
        let prepared = prepare_query(&fixtures::shop(), &query).unwrap();

        let group_by = prepared.sql.split(" GROUP BY ").nth(1).unwrap();
        for join in &prepared.joins_list {
            let expected = match join.table_ref.table_name.as_str() {
                "order_fulfilment" => format!("{}.order_id", join.join_alias),
                _ => format!("{}.id", join.join_alias),
            };
            assert!(group_by.contains(&expected), "{} missing from {}", expected, group_by);
        }
    }

    #[test]
    fn test_join_condition_needs_a_foreign_key() {
        let schemas = fixtures::shop();

        let on = join_condition(&schemas, (&table("customers"), "c"), (&table("orders"), "o")).unwrap();
        assert_eq!(on, "o.customer_id = c.id");

        let result = join_condition(&schemas, (&table("customers"), "c"), (&table("audit_log"), "a"));
        match result {
            Err(QueryError::NoDirectForeignKey { from, to }) => {
                assert_eq!(from, table("customers"));
                assert_eq!(to, table("audit_log"));
            }
            other => panic!("expected NoDirectForeignKey, got {:?}", other),
        }
    }
}

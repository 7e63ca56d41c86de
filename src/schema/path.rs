use log::debug;
use petgraph::algo::astar;
use std::collections::HashSet;

use super::graph::{PathCost, SchemaGraph};
use super::types::TableRef;
use crate::error::{QueryError, Result};

/// A route through the schema graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPath {
    pub nodes: Vec<TableRef>,
    /// Number of foreign-key hops
    pub weight: usize,
    /// Summed name-similarity penalty, used only to break ties
    pub penalty: f64,
}

/// Cheapest path between two tables. Fewest hops wins, then the lowest
/// similarity penalty, then whichever route the search reaches first.
pub fn shortest_path(graph: &SchemaGraph, from: &TableRef, to: &TableRef) -> Result<GraphPath> {
    let no_path = || QueryError::NoPath {
        from: from.clone(),
        to: to.clone(),
    };

    let start = graph.node(from).ok_or_else(no_path)?;
    let goal = graph.node(to).ok_or_else(no_path)?;

    let (cost, indices) = astar(
        &graph.graph,
        start,
        |n| n == goal,
        |e| *e.weight(),
        |_| PathCost::default(),
    )
    .ok_or_else(no_path)?;

    Ok(GraphPath {
        nodes: indices.into_iter().map(|idx| graph.table_ref(idx).clone()).collect(),
        weight: cost.hops,
        penalty: cost.penalty,
    })
}

/// Path from `from` to `to` passing through every table in `via`, in order.
///
/// The returned list starts with `from` and ends with `to`; each waypoint
/// splice appears once.
pub fn resolve_path(
    graph: &SchemaGraph,
    from: &TableRef,
    to: &TableRef,
    via: &[TableRef],
) -> Result<Vec<TableRef>> {
    let invalid = |reason: &'static str| QueryError::InvalidWaypoint {
        from: from.clone(),
        to: to.clone(),
        via: via.to_vec(),
        reason,
    };

    let unique: HashSet<&TableRef> = via.iter().collect();
    if unique.len() != via.len() {
        return Err(invalid("via path contains duplicate table refs"));
    }
    if via.contains(from) {
        return Err(invalid("via path includes the source table"));
    }
    if via.last() == Some(to) {
        return Err(invalid("via path ends with the target table"));
    }

    let mut route = Vec::with_capacity(via.len() + 2);
    route.push(from);
    route.extend(via.iter());
    route.push(to);

    let mut path = vec![from.clone()];
    for pair in route.windows(2) {
        let (a, b) = (pair[0], pair[1]);

        if a == b {
            // Only reachable as from == to with no waypoints: a self-join
            if !graph.has_self_loop(a) {
                return Err(QueryError::NoPath {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            path.push(b.clone());
            continue;
        }

        let segment = shortest_path(graph, a, b).map_err(|_| QueryError::NoPath {
            from: from.clone(),
            to: to.clone(),
        })?;
        path.extend(segment.nodes.into_iter().skip(1));
    }

    debug!(
        "Resolved {} -> {}: {}",
        from,
        to,
        path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" > ")
    );

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build::assemble_schemas;
    use crate::schema::fixtures::{self, column, relation, table};
    use crate::schema::GenericDataType::Number;

    fn names(path: &[TableRef]) -> Vec<&str> {
        path.iter().map(|t| t.table_name.as_str()).collect()
    }

    #[test]
    fn test_shortest_path_counts_hops() {
        let graph = SchemaGraph::new(&fixtures::movies());
        let path = shortest_path(&graph, &table("movies"), &table("actors")).unwrap();
        assert_eq!(names(&path.nodes), vec!["movies", "movie_actors", "actors"]);
        assert_eq!(path.weight, 2);
    }

    #[test]
    fn test_disconnected_tables_have_no_path() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let result = shortest_path(&graph, &table("customers"), &table("audit_log"));
        assert!(matches!(result, Err(QueryError::NoPath { .. })));
    }

    #[test]
    fn test_similar_names_break_ties() {
        // Two equally long routes; the one through the similarly named table wins
        // even though the other one is declared first.
        let schemas = assemble_schemas(
            vec![
                column("customers", "id", Number, true),
                column("zzz", "id", Number, true),
                column("zzz", "customer_id", Number, false),
                column("zzz", "invoice_id", Number, false),
                column("customer_notes", "id", Number, true),
                column("customer_notes", "customer_id", Number, false),
                column("customer_notes", "invoice_id", Number, false),
                column("invoices", "id", Number, true),
            ],
            &[
                relation("zzz", "customer_id", "customers", "id"),
                relation("zzz", "invoice_id", "invoices", "id"),
                relation("customer_notes", "customer_id", "customers", "id"),
                relation("customer_notes", "invoice_id", "invoices", "id"),
            ],
        );
        let graph = SchemaGraph::new(&schemas);
        let path = shortest_path(&graph, &table("customers"), &table("invoices")).unwrap();
        assert_eq!(names(&path.nodes), vec!["customers", "customer_notes", "invoices"]);
        assert_eq!(path.weight, 2);
    }

    #[test]
    fn test_resolve_path_splices_waypoints() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let path = resolve_path(
            &graph,
            &table("customers"),
            &table("orders"),
            &[table("phone_numbers")],
        )
        .unwrap();
        assert_eq!(names(&path), vec!["customers", "phone_numbers", "orders"]);

        let path = resolve_path(
            &graph,
            &table("customers"),
            &table("orders"),
            &[table("orders"), table("order_fulfilment")],
        )
        .unwrap();
        assert_eq!(
            names(&path),
            vec!["customers", "orders", "order_fulfilment", "orders"]
        );
    }

    #[test]
    fn test_resolve_path_without_via_is_shortest() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let path = resolve_path(&graph, &table("order_fulfilment"), &table("customers"), &[]).unwrap();
        assert_eq!(names(&path), vec!["order_fulfilment", "orders", "customers"]);
    }

    #[test]
    fn test_via_including_source_is_rejected() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let result = resolve_path(
            &graph,
            &table("customers"),
            &table("order_fulfilment"),
            &[table("customers"), table("orders")],
        );
        assert!(matches!(result, Err(QueryError::InvalidWaypoint { .. })));
    }

    #[test]
    fn test_via_with_duplicates_is_rejected() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let result = resolve_path(
            &graph,
            &table("customers"),
            &table("order_fulfilment"),
            &[table("orders"), table("orders")],
        );
        assert!(matches!(result, Err(QueryError::InvalidWaypoint { .. })));
    }

    #[test]
    fn test_via_ending_with_target_is_rejected() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let result = resolve_path(
            &graph,
            &table("customers"),
            &table("orders"),
            &[table("phone_numbers"), table("orders")],
        );
        assert!(matches!(result, Err(QueryError::InvalidWaypoint { .. })));
    }

    #[test]
    fn test_self_join_needs_self_reference() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let path = resolve_path(&graph, &table("employees"), &table("employees"), &[]).unwrap();
        assert_eq!(names(&path), vec!["employees", "employees"]);

        let result = resolve_path(&graph, &table("orders"), &table("orders"), &[]);
        assert!(matches!(result, Err(QueryError::NoPath { .. })));
    }

    #[test]
    fn test_unreachable_waypoint_fails() {
        let graph = SchemaGraph::new(&fixtures::shop());
        let result = resolve_path(
            &graph,
            &table("customers"),
            &table("orders"),
            &[table("audit_log")],
        );
        assert!(matches!(result, Err(QueryError::NoPath { .. })));
    }
}

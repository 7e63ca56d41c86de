//! Join-tree normalisation.
//!
//! Users describe a query as a tree of tables where each child may sit any
//! number of foreign-key hops away from its parent, optionally routed through
//! explicit `via` tables. SQL needs every join to be a single hop, so the
//! authored tree is turned into a canonical one:
//!
//! 1. every authored node gets an alias `schema__table__N`, N counting
//!    occurrences of that table across the whole query in pre-order;
//! 2. every node gets its full path of tables from the base table;
//! 3. the tree is rebuilt from those paths so that each node's path is its
//!    parent's plus one table, inserting bridge joins (which select nothing)
//!    for any intermediate table that was not authored.

use log::debug;
use serde::Serialize;
use std::collections::HashMap;

use super::emit::render_sql;
use super::types::{FlattenedJoin, JoinDef, JoinId, JoinTree, PreparedJoin, PreparedQuery, Query, Select};
use crate::error::{QueryError, Result};
use crate::schema::{find_table, resolve_path, DatabaseSchema, SchemaGraph, TableRef};

/// Compiled form of a [`Query`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSql {
    pub sql: String,
    pub prepared_query: PreparedQuery,
    pub joins_list: Vec<FlattenedJoin>,
}

/// Compile a query into SQL plus the canonical join tree it was built from.
/// The SQL carries no LIMIT; see [`crate::query::run_query`].
pub fn prepare_query(schemas: &[DatabaseSchema], query: &Query) -> Result<PreparedSql> {
    let graph = SchemaGraph::new(schemas);
    let tree = normalize(schemas, &graph, &query.base)?;
    let sql = render_sql(schemas, &tree)?;

    debug!("Prepared SQL: {}", sql);

    Ok(PreparedSql {
        sql,
        joins_list: tree.flatten(),
        prepared_query: PreparedQuery {
            base: tree,
            limit: query.limit,
        },
    })
}

/// Per-table occurrence counter behind join aliases
#[derive(Debug, Default)]
struct AliasCounter {
    seen: HashMap<TableRef, usize>,
}

impl AliasCounter {
    fn next(&mut self, table_ref: &TableRef) -> String {
        let count = self.seen.entry(table_ref.clone()).or_insert(0);
        *count += 1;
        format!("{}__{}__{}", table_ref.schema_name, table_ref.table_name, count)
    }
}

/// An authored node with its alias and path, before the tree is rebuilt
struct AuthoredJoin<'q> {
    def: &'q JoinDef,
    join_alias: String,
    path_from_base: Vec<TableRef>,
    parent: Option<usize>,
}

/// Build the canonical join tree for `base`
pub fn normalize(schemas: &[DatabaseSchema], graph: &SchemaGraph, base: &JoinDef) -> Result<JoinTree> {
    if !find_table(schemas, &base.table_ref)?.has_relationships() {
        return Err(QueryError::NoRelationships {
            table: base.table_ref.clone(),
        });
    }

    let mut counter = AliasCounter::default();
    let mut authored = Vec::new();
    collect_authored(schemas, graph, base, None, &mut counter, &mut authored)?;

    // Authored node i becomes arena node i. All of them exist before any
    // parent is chosen, so a bridge is never built for a path an authored
    // node owns, whatever the sibling order.
    let mut nodes = authored
        .iter()
        .map(|join| {
            Ok(PreparedJoin {
                table_ref: join.def.table_ref.clone(),
                join_alias: join.join_alias.clone(),
                select: expand_select(schemas, join.def)?,
                condition: join.def.condition.clone(),
                via: join.def.via.clone(),
                order_by: join.def.order_by.clone(),
                path_from_base: join.path_from_base.clone(),
                bridge: false,
                parent: None,
                children: Vec::new(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for (id, join) in authored.iter().enumerate() {
        let Some(authored_parent) = join.parent else {
            continue;
        };

        // Nearest authored ancestors first, so a node stays under the join it
        // was written under whenever the paths allow it
        let mut ancestors: Vec<JoinId> = Vec::new();
        let mut cursor = Some(authored_parent);
        while let Some(idx) = cursor {
            ancestors.push(idx);
            cursor = authored[idx].parent;
        }

        let prefix = &join.path_from_base[..join.path_from_base.len() - 1];
        let parent = attach_point(&mut nodes, prefix, &ancestors, &mut counter);
        nodes[id].parent = Some(parent);
        nodes[parent].children.push(id);
    }

    debug!(
        "Normalized {} authored joins into {} joins",
        authored.len(),
        nodes.len()
    );

    Ok(JoinTree::from_nodes(nodes))
}

/// Pre-order walk assigning aliases and paths, rejecting duplicate siblings
fn collect_authored<'q>(
    schemas: &[DatabaseSchema],
    graph: &SchemaGraph,
    def: &'q JoinDef,
    parent: Option<usize>,
    counter: &mut AliasCounter,
    out: &mut Vec<AuthoredJoin<'q>>,
) -> Result<()> {
    find_table(schemas, &def.table_ref)?;

    let join_alias = counter.next(&def.table_ref);

    let path_from_base = match parent {
        None => vec![def.table_ref.clone()],
        Some(idx) => {
            let parent_join = &out[idx];
            let kept = parent_join.path_from_base.len() - 1;
            let mut path = parent_join.path_from_base[..kept].to_vec();
            path.extend(resolve_path(
                graph,
                &parent_join.def.table_ref,
                &def.table_ref,
                &def.via,
            )?);
            path
        }
    };

    for (i, child) in def.joins.iter().enumerate() {
        if def.joins[..i].iter().any(|other| other.table_ref == child.table_ref) {
            let mut path = path_from_base.clone();
            path.push(child.table_ref.clone());
            return Err(QueryError::DuplicateTableRef {
                table: child.table_ref.clone(),
                path,
            });
        }
    }

    let idx = out.len();
    out.push(AuthoredJoin {
        def,
        join_alias,
        path_from_base,
        parent,
    });

    for child in &def.joins {
        collect_authored(schemas, graph, child, Some(idx), counter, out)?;
    }

    Ok(())
}

/// Find the node whose path is exactly `prefix`, creating bridge joins for
/// any part of it that no node covers yet
fn attach_point(
    nodes: &mut Vec<PreparedJoin>,
    prefix: &[TableRef],
    ancestors: &[JoinId],
    counter: &mut AliasCounter,
) -> JoinId {
    if let Some(&id) = ancestors.iter().find(|&&id| nodes[id].path_from_base == prefix) {
        return id;
    }
    if let Some(id) = nodes.iter().position(|n| n.path_from_base == prefix) {
        return id;
    }
    if prefix.len() <= 1 {
        return JoinTree::ROOT;
    }

    let parent = attach_point(nodes, &prefix[..prefix.len() - 1], ancestors, counter);
    let table_ref = prefix[prefix.len() - 1].clone();

    let id = nodes.len();
    nodes.push(PreparedJoin {
        join_alias: counter.next(&table_ref),
        table_ref,
        select: Vec::new(),
        condition: None,
        via: Vec::new(),
        order_by: Vec::new(),
        path_from_base: prefix.to_vec(),
        bridge: true,
        parent: Some(parent),
        children: Vec::new(),
    });
    nodes[parent].children.push(id);

    id
}

/// Concrete column list for a join, checking explicit columns exist
fn expand_select(schemas: &[DatabaseSchema], def: &JoinDef) -> Result<Vec<String>> {
    let table = find_table(schemas, &def.table_ref)?;

    match &def.select {
        Select::All => Ok(table.column_names()),
        Select::Columns(columns) => {
            if let Some(missing) = columns.iter().find(|c| !table.has_column(c)) {
                return Err(QueryError::UnknownColumn {
                    table: def.table_ref.clone(),
                    column: missing.clone(),
                });
            }
            Ok(columns.clone())
        }
    }
}

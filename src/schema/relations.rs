use serde::Serialize;

use super::build::{all_tables, find_table};
use super::graph::SchemaGraph;
use super::path::shortest_path;
use super::types::{DatabaseSchema, DatabaseTableInfo, TableRef};
use crate::error::{QueryError, Result};

/// A table reachable from another one, with its distance in foreign-key hops
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTable {
    pub schema_name: String,
    pub table_name: String,
    pub shortest_join_path: usize,
}

/// Every other table reachable from `schema.table`, optionally limited to
/// `max_joins` hops. Unreachable tables are left out. Results follow catalog order.
pub fn get_relations_for_table(
    schemas: &[DatabaseSchema],
    schema_name: &str,
    table_name: &str,
    max_joins: Option<usize>,
) -> Result<Vec<RelatedTable>> {
    let target = TableRef::new(schema_name, table_name);
    if !find_table(schemas, &target)?.has_relationships() {
        return Err(QueryError::NoRelationships { table: target });
    }

    let graph = SchemaGraph::new(schemas);

    let related = all_tables(schemas)
        .filter(|(table_ref, _)| *table_ref != target)
        .filter_map(|(table_ref, _)| {
            let path = shortest_path(&graph, &target, &table_ref).ok()?;
            if max_joins.is_some_and(|max| path.weight > max) {
                return None;
            }
            Some(RelatedTable {
                schema_name: table_ref.schema_name,
                table_name: table_ref.table_name,
                shortest_join_path: path.weight,
            })
        })
        .collect();

    Ok(related)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitiesAndJunctions {
    pub entities: Vec<TableRef>,
    pub junctions: Vec<TableRef>,
}

/// Split tables into entities and many-to-many junction tables.
///
/// Best effort: a junction has at least two columns with foreign keys to other
/// tables, and every such column is named after a table the junction's own
/// name mentions (`movie_id` and `actor_id` in `movie_actors`).
pub fn get_entities_and_junctions(schemas: &[DatabaseSchema]) -> EntitiesAndJunctions {
    let mut result = EntitiesAndJunctions::default();

    for (table_ref, table) in all_tables(schemas) {
        if is_junction(&table_ref, table) {
            result.junctions.push(table_ref);
        } else {
            result.entities.push(table_ref);
        }
    }

    result
}

fn is_junction(table_ref: &TableRef, table: &DatabaseTableInfo) -> bool {
    let linking_columns: Vec<&str> = table
        .columns
        .iter()
        .filter(|column| column.foreign_keys.iter().any(|fk| &fk.foreign_table != table_ref))
        .map(|column| column.name.as_str())
        .collect();

    if linking_columns.len() < 2 {
        return false;
    }

    linking_columns.iter().all(|name| {
        let snake = to_snake_case(name);
        match snake.split('_').find(|token| !token.is_empty()) {
            Some(entity) => table.name.contains(entity) || table.name.contains(&pluralize(entity)),
            None => false,
        }
    })
}

/// Convert camelCase or kebab-case to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev_lower = false;

    for c in s.chars() {
        if c == '-' || c == ' ' {
            result.push('_');
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }

    result
}

/// English plural of a single lowercase word
fn pluralize(word: &str) -> String {
    const IRREGULAR: &[(&str, &str)] = &[
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("mouse", "mice"),
        ("goose", "geese"),
        ("tooth", "teeth"),
        ("foot", "feet"),
        ("ox", "oxen"),
    ];

    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{}es", word);
    }

    if let Some(stem) = word.strip_suffix('y') {
        if !stem.is_empty() && !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }

    if let Some(stem) = word.strip_suffix("fe") {
        return format!("{}ves", stem);
    }
    if let Some(stem) = word.strip_suffix('f') {
        return format!("{}ves", stem);
    }

    format!("{}s", word)
}

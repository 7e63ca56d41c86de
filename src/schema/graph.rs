use log::{debug, warn};
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Add;

use super::build::all_tables;
use super::types::{DatabaseSchema, TableRef};

/// Cost of traversing one or more foreign-key hops.
///
/// Ordered by hop count first; the name-similarity penalty only separates
/// paths of equal length.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathCost {
    pub hops: usize,
    pub penalty: f64,
}

impl PathCost {
    fn hop(penalty: f64) -> Self {
        Self { hops: 1, penalty }
    }
}

impl Add for PathCost {
    type Output = PathCost;

    fn add(self, rhs: PathCost) -> PathCost {
        PathCost {
            hops: self.hops + rhs.hops,
            penalty: self.penalty + rhs.penalty,
        }
    }
}

impl PartialOrd for PathCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.hops.cmp(&other.hops) {
            Ordering::Equal => self.penalty.partial_cmp(&other.penalty),
            ord => Some(ord),
        }
    }
}

/// Tables as nodes, foreign keys as edges in both directions
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    pub(crate) graph: DiGraph<TableRef, PathCost>,
    nodes: HashMap<TableRef, NodeIndex>,
}

impl SchemaGraph {
    pub fn new(schemas: &[DatabaseSchema]) -> Self {
        Self::with_ignored(schemas, &[])
    }

    /// Build the graph, leaving out `ignore`d tables and every edge touching them
    pub fn with_ignored(schemas: &[DatabaseSchema], ignore: &[TableRef]) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for (table_ref, _) in all_tables(schemas) {
            if ignore.contains(&table_ref) {
                continue;
            }
            let idx = graph.add_node(table_ref.clone());
            nodes.insert(table_ref, idx);
        }

        let mut this = Self { graph, nodes };

        for (table_ref, table) in all_tables(schemas) {
            for column in &table.columns {
                let targets = column
                    .foreign_keys
                    .iter()
                    .map(|fk| &fk.foreign_table)
                    .chain(column.foreign_key_references.iter().map(|fk| &fk.local_table));

                for other in targets {
                    this.link(&table_ref, other);
                }
            }
        }

        debug!(
            "Schema graph has {} tables and {} directed edges",
            this.graph.node_count(),
            this.graph.edge_count()
        );

        this
    }

    fn link(&mut self, from: &TableRef, to: &TableRef) {
        let Some(&a) = self.nodes.get(from) else {
            return;
        };
        let Some(&b) = self.nodes.get(to) else {
            debug!("Skipping relationship {} -> {}: target not in graph", from, to);
            return;
        };

        let cost = PathCost::hop(1.0 - name_similarity(&from.table_name, &to.table_name));
        self.graph.update_edge(a, b, cost);
        self.graph.update_edge(b, a, cost);
    }

    pub(crate) fn node(&self, table_ref: &TableRef) -> Option<NodeIndex> {
        self.nodes.get(table_ref).copied()
    }

    pub(crate) fn table_ref(&self, idx: NodeIndex) -> &TableRef {
        &self.graph[idx]
    }

    pub fn contains(&self, table_ref: &TableRef) -> bool {
        self.nodes.contains_key(table_ref)
    }

    /// True if the table has a foreign key to itself
    pub fn has_self_loop(&self, table_ref: &TableRef) -> bool {
        self.node(table_ref)
            .map(|idx| self.graph.find_edge(idx, idx).is_some())
            .unwrap_or(false)
    }

    pub fn neighbors(&self, table_ref: &TableRef) -> Vec<&TableRef> {
        match self.node(table_ref) {
            Some(idx) => self.graph.neighbors(idx).map(|n| &self.graph[n]).collect(),
            None => {
                warn!("Table {} is not part of the schema graph", table_ref);
                Vec::new()
            }
        }
    }
}

/// Sørensen–Dice coefficient over character bigrams, ignoring whitespace.
/// 1.0 for identical names, 0.0 when nothing is shared.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut first: HashMap<(char, char), usize> = HashMap::new();
    for pair in a.windows(2) {
        *first.entry((pair[0], pair[1])).or_default() += 1;
    }

    let mut shared = 0;
    for pair in b.windows(2) {
        if let Some(count) = first.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    (2.0 * shared as f64) / ((a.len() - 1) + (b.len() - 1)) as f64
}

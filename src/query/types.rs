use serde::{Deserialize, Serialize, Serializer};

use super::condition::Condition;
use crate::error::Result;
use crate::schema::{find_table, DatabaseSchema, TableRef};

/// Columns to output for a join: an explicit list, or `"*"` for all of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectRepr", into = "SelectRepr")]
pub enum Select {
    All,
    Columns(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectRepr {
    Wildcard(String),
    Columns(Vec<String>),
}

impl TryFrom<SelectRepr> for Select {
    type Error = String;

    fn try_from(value: SelectRepr) -> std::result::Result<Self, Self::Error> {
        match value {
            SelectRepr::Wildcard(s) if s == "*" => Ok(Select::All),
            SelectRepr::Wildcard(s) => Err(format!("select must be \"*\" or a list of columns, got {:?}", s)),
            SelectRepr::Columns(columns) => Ok(Select::Columns(columns)),
        }
    }
}

impl From<Select> for SelectRepr {
    fn from(value: Select) -> Self {
        match value {
            Select::All => SelectRepr::Wildcard("*".to_string()),
            Select::Columns(columns) => SelectRepr::Columns(columns),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
    /// Required, and unique, once a query sorts on more than one column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

/// One node of a user-authored join specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDef {
    pub table_ref: TableRef,
    /// Tables the join must pass through on its way from the parent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<TableRef>,
    pub select: Select,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinDef>,
}

impl JoinDef {
    pub fn new(table_ref: TableRef, select: Select) -> Self {
        Self {
            table_ref,
            via: Vec::new(),
            select,
            condition: None,
            order_by: Vec::new(),
            joins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub base: JoinDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// Index of a node within a [`JoinTree`]
pub type JoinId = usize;

/// A canonical join: every edge to its parent is a single foreign-key hop and
/// its alias is unique across the whole query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedJoin {
    pub table_ref: TableRef,
    pub join_alias: String,
    pub select: Vec<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<TableRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    pub path_from_base: Vec<TableRef>,
    /// Inserted only to carry a multi-hop path; never authored, selects nothing
    pub bridge: bool,
    #[serde(skip)]
    pub parent: Option<JoinId>,
    #[serde(skip)]
    pub children: Vec<JoinId>,
}

/// Arena holding the canonical join tree. The root is always node 0.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTree {
    nodes: Vec<PreparedJoin>,
}

impl JoinTree {
    pub(crate) fn from_nodes(nodes: Vec<PreparedJoin>) -> Self {
        debug_assert!(!nodes.is_empty() && nodes[0].parent.is_none());
        Self { nodes }
    }

    pub const ROOT: JoinId = 0;

    pub fn root(&self) -> &PreparedJoin {
        &self.nodes[Self::ROOT]
    }

    pub fn get(&self, id: JoinId) -> &PreparedJoin {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn by_alias(&self, join_alias: &str) -> Option<&PreparedJoin> {
        self.nodes.iter().find(|n| n.join_alias == join_alias)
    }

    /// Node ids in depth-first pre-order, children in insertion order
    pub fn pre_order(&self) -> Vec<JoinId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }

        order
    }

    /// The tree as a list in pre-order, each entry pointing at its parent and
    /// summarising its direct children
    pub fn flatten(&self) -> Vec<FlattenedJoin> {
        self.pre_order()
            .into_iter()
            .map(|id| {
                let join = &self.nodes[id];
                FlattenedJoin {
                    id,
                    table_ref: join.table_ref.clone(),
                    join_alias: join.join_alias.clone(),
                    select: join.select.clone(),
                    parent: join.parent,
                    child_joins: join
                        .children
                        .iter()
                        .map(|&child| ChildJoin {
                            table_ref: self.nodes[child].table_ref.clone(),
                            join_alias: self.nodes[child].join_alias.clone(),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn serialize_node<S: Serializer>(&self, id: JoinId, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Node<'a>(&'a JoinTree, JoinId);

        impl Serialize for Node<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                self.0.serialize_node(self.1, serializer)
            }
        }

        /// A join's own fields with its children nested under `joins`
        #[derive(Serialize)]
        struct NodeRepr<'a> {
            #[serde(flatten)]
            join: &'a PreparedJoin,
            joins: Vec<Node<'a>>,
        }

        let join = &self.nodes[id];
        NodeRepr {
            join,
            joins: join.children.iter().map(|&child| Node(self, child)).collect(),
        }
        .serialize(serializer)
    }
}

impl Serialize for JoinTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.serialize_node(Self::ROOT, serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedQuery {
    pub base: JoinTree,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildJoin {
    pub table_ref: TableRef,
    pub join_alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedJoin {
    pub id: JoinId,
    pub table_ref: TableRef,
    pub join_alias: String,
    pub select: Vec<String>,
    pub parent: Option<JoinId>,
    pub child_joins: Vec<ChildJoin>,
}

/// True if both queries describe the same join tree. `"*"` and the full
/// column list of a table count as the same selection; `limit` is ignored.
pub fn queries_equivalent(schemas: &[DatabaseSchema], a: &Query, b: &Query) -> Result<bool> {
    joins_equivalent(schemas, &a.base, &b.base)
}

fn joins_equivalent(schemas: &[DatabaseSchema], a: &JoinDef, b: &JoinDef) -> Result<bool> {
    if a.table_ref != b.table_ref
        || a.via != b.via
        || a.condition != b.condition
        || a.order_by != b.order_by
        || a.joins.len() != b.joins.len()
    {
        return Ok(false);
    }

    if expanded_select(schemas, a)? != expanded_select(schemas, b)? {
        return Ok(false);
    }

    for (child_a, child_b) in a.joins.iter().zip(&b.joins) {
        if !joins_equivalent(schemas, child_a, child_b)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// The concrete column list a join selects
pub fn expanded_select(schemas: &[DatabaseSchema], join: &JoinDef) -> Result<Vec<String>> {
    match &join.select {
        Select::All => Ok(find_table(schemas, &join.table_ref)?.column_names()),
        Select::Columns(columns) => Ok(columns.clone()),
    }
}

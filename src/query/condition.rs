//! WHERE-clause conditions.
//!
//! A condition is either a boolean combination of other conditions, a
//! comparison of one column against a value, or a membership test of one
//! column against a list. Conditions come from a UI that builds them
//! incrementally, so half-filled ones are expected and can be pruned with
//! [`Condition::to_complete`] before compiling.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::schema::{DatabaseTableInfo, TableRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOperator {
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
}

impl BooleanOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueOperator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<>")]
    NotEquals,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "not like")]
    NotLike,
}

impl ValueOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            ValueOperator::Equals => "=",
            ValueOperator::LessThan => "<",
            ValueOperator::GreaterThan => ">",
            ValueOperator::LessThanOrEqual => "<=",
            ValueOperator::GreaterThanOrEqual => ">=",
            ValueOperator::NotEquals => "<>",
            ValueOperator::Like => "LIKE",
            ValueOperator::NotLike => "NOT LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOperator {
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl ListOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            ListOperator::In => "IN",
            ListOperator::NotIn => "NOT IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Boolean {
        operator: BooleanOperator,
        conditions: Vec<Condition>,
    },
    List {
        column: String,
        operator: ListOperator,
        values: Vec<String>,
    },
    Value {
        column: String,
        operator: ValueOperator,
        value: String,
    },
}

impl Condition {
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::Boolean {
            operator: BooleanOperator::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Boolean {
            operator: BooleanOperator::Or,
            conditions,
        }
    }

    pub fn value(column: impl Into<String>, operator: ValueOperator, value: impl Into<String>) -> Self {
        Condition::Value {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn list<I, S>(column: impl Into<String>, operator: ListOperator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::List {
            column: column.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// True when every leaf names a column and has something to compare against
    pub fn is_complete(&self) -> bool {
        match self {
            Condition::Boolean { conditions, .. } => conditions.iter().all(Condition::is_complete),
            Condition::List { column, values, .. } => !column.is_empty() && !values.is_empty(),
            Condition::Value { column, value, .. } => !column.is_empty() && !value.is_empty(),
        }
    }

    /// Drop incomplete children of a boolean condition. Returns `None` if
    /// nothing usable is left.
    pub fn to_complete(&self) -> Option<Condition> {
        match self {
            Condition::Boolean { operator, conditions } => {
                let complete: Vec<Condition> = conditions
                    .iter()
                    .filter(|c| c.is_complete())
                    .cloned()
                    .collect();
                if complete.is_empty() {
                    None
                } else {
                    Some(Condition::Boolean {
                        operator: *operator,
                        conditions: complete,
                    })
                }
            }
            leaf if leaf.is_complete() => Some(leaf.clone()),
            _ => None,
        }
    }

    /// Render as a SQL boolean expression over `table`, with columns qualified
    /// by `alias` (or `schema.table` when no alias is given).
    pub fn render(
        &self,
        table_ref: &TableRef,
        table: &DatabaseTableInfo,
        alias: Option<&str>,
    ) -> Result<String> {
        let qualifier = match alias {
            Some(alias) => alias.to_string(),
            None => table_ref.to_string(),
        };
        self.render_with(table_ref, table, &qualifier)
    }

    fn render_with(&self, table_ref: &TableRef, table: &DatabaseTableInfo, qualifier: &str) -> Result<String> {
        let check_column = |column: &str| {
            if table.has_column(column) {
                Ok(())
            } else {
                Err(QueryError::UnknownColumn {
                    table: table_ref.clone(),
                    column: column.to_string(),
                })
            }
        };

        match self {
            Condition::Boolean { operator, conditions } => {
                if conditions.is_empty() {
                    // Identity element of the operator
                    return Ok(match operator {
                        BooleanOperator::And => "(1 = 1)".to_string(),
                        BooleanOperator::Or => "(1 = 0)".to_string(),
                    });
                }
                let parts = conditions
                    .iter()
                    .map(|c| c.render_with(table_ref, table, qualifier))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!(
                    "({})",
                    parts.join(&format!(" {} ", operator.as_sql()))
                ))
            }
            Condition::Value { column, operator, value } => {
                check_column(column)?;
                Ok(format!(
                    "{}.{} {} {}",
                    qualifier,
                    column,
                    operator.as_sql(),
                    quote_literal(value)
                ))
            }
            Condition::List { column, operator, values } => {
                check_column(column)?;
                let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                Ok(format!(
                    "{}.{} {} ({})",
                    qualifier,
                    column,
                    operator.as_sql(),
                    values.join(",")
                ))
            }
        }
    }
}

/// Single-quote a literal, doubling embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

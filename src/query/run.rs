use log::{debug, error};
use serde::Serialize;
use serde_json::Value;

use super::emit::output_alias;
use super::prepare::{prepare_query, PreparedSql};
use super::types::{FlattenedJoin, PreparedQuery, Query};
use crate::driver::{DatabaseDriver, Row};
use crate::error::{QueryError, Result};
use crate::schema::{find_table, DatabaseSchema, TableRef};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeta {
    pub prepared_query: PreparedQuery,
    pub joins_list: Vec<FlattenedJoin>,
}

/// The columns one join contributed to a result row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRow {
    pub join_alias: String,
    pub table_ref: TableRef,
    pub data: Row,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub sql: String,
    pub meta: QueryMeta,
    /// One entry per result row, holding one [`JoinRow`] per join in pre-order
    pub rows: Vec<Vec<JoinRow>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountMeta {
    pub prepared_query: PreparedQuery,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountResult {
    pub count: u64,
    pub meta: CountMeta,
}

/// Compile and execute a query, regrouping each flat result row by join
pub fn run_query(
    driver: &dyn DatabaseDriver,
    schemas: &[DatabaseSchema],
    query: &Query,
) -> Result<QueryResult> {
    let PreparedSql {
        mut sql,
        prepared_query,
        joins_list,
    } = prepare_query(schemas, query)?;

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let raw_rows = exec_logged(driver, &sql)?;
    debug!("Query returned {} rows", raw_rows.len());

    let layout = row_layout(schemas, &joins_list)?;
    let rows = raw_rows.iter().map(|row| split_row(&layout, row)).collect();

    Ok(QueryResult {
        sql,
        meta: QueryMeta {
            prepared_query,
            joins_list,
        },
        rows,
    })
}

/// Number of rows a query would return, ignoring its limit
pub fn get_count_for_query(
    driver: &dyn DatabaseDriver,
    schemas: &[DatabaseSchema],
    query: &Query,
) -> Result<CountResult> {
    let unlimited = Query {
        base: query.base.clone(),
        limit: None,
    };
    let prepared = prepare_query(schemas, &unlimited)?;

    let sql = format!(
        "SELECT COUNT(*) AS count FROM ({}) AS counted_rows",
        prepared.sql
    );
    let rows = exec_logged(driver, &sql)?;

    let count = rows
        .first()
        .and_then(|row| row.get("count"))
        .and_then(parse_count)
        .ok_or(QueryError::InvalidCount)?;

    Ok(CountResult {
        count,
        meta: CountMeta {
            prepared_query: prepared.prepared_query,
        },
    })
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn exec_logged(driver: &dyn DatabaseDriver, sql: &str) -> Result<Vec<Row>> {
    driver.exec(sql).map_err(|e| {
        error!("Error while executing SQL:\n{}\n{}", sql, e);
        QueryError::from(e)
    })
}

/// For each join, its alias and table with the (column, output alias) pairs
/// it selected, in table column order
type RowLayout<'a> = Vec<(&'a FlattenedJoin, Vec<(String, String)>)>;

fn row_layout<'a>(schemas: &[DatabaseSchema], joins: &'a [FlattenedJoin]) -> Result<RowLayout<'a>> {
    joins
        .iter()
        .map(|join| {
            let table = find_table(schemas, &join.table_ref)?;
            let columns = table
                .columns
                .iter()
                .filter(|c| join.select.contains(&c.name))
                .map(|c| (c.name.clone(), output_alias(&join.join_alias, &c.name)))
                .collect();
            Ok((join, columns))
        })
        .collect()
}

fn split_row(layout: &RowLayout<'_>, row: &Row) -> Vec<JoinRow> {
    layout
        .iter()
        .map(|(join, columns)| JoinRow {
            join_alias: join.join_alias.clone(),
            table_ref: join.table_ref.clone(),
            data: columns
                .iter()
                .map(|(name, alias)| (name.clone(), row.get(alias).cloned().unwrap_or(Value::Null)))
                .collect(),
        })
        .collect()
}

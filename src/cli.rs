use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::schema::TableRef;

#[derive(Parser, Debug)]
#[command(name = "relquery")]
#[command(version, about = "Compile nested join specifications into SQL by following foreign keys")]
pub struct Cli {
    /// SQLite database file
    #[arg(short, long, global = true, env = "RELQUERY_DATABASE")]
    pub database: Option<PathBuf>,

    /// Tables to leave out entirely (comma-separated schema.table)
    #[arg(long, global = true, value_delimiter = ',')]
    pub ignore: Vec<TableRef>,

    /// Log generated SQL and path resolution
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the introspected schema as JSON
    Schema,

    /// List tables reachable from a table, with their distance in joins
    Relations {
        /// Table as schema.table
        table: TableRef,

        /// Only include tables at most this many joins away
        #[arg(short, long)]
        max_joins: Option<usize>,
    },

    /// Split tables into entities and junction tables
    Entities,

    /// Compile a query file to SQL without running it
    Prepare {
        /// JSON query file, or - for stdin
        query_file: PathBuf,
    },

    /// Compile and run a query file
    Run {
        /// JSON query file, or - for stdin
        query_file: PathBuf,

        /// Override the query's limit
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Count the rows a query file would return
    Count {
        /// JSON query file, or - for stdin
        query_file: PathBuf,
    },

    /// Fetch rows of one table related to a row of another
    Related {
        /// Table the known row lives in
        local: TableRef,

        /// Table to fetch rows from
        foreign: TableRef,

        /// Column values identifying the local row (column=value, repeatable)
        #[arg(short = 'm', long = "match", value_parser = parse_match)]
        matches: Vec<(String, String)>,
    },

    /// Check that the database can be opened and queried
    TestConnection,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

fn parse_match(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((column, value)) if !column.is_empty() => Ok((column.to_string(), value.to_string())),
        _ => Err(format!("expected column=value, got `{}`", s)),
    }
}

use anyhow::{Context, Result};
use log::info;
use relquery::{
    cli::{Cli, Commands},
    driver::{DatabaseDriver, Row, SqliteDriver},
    query::{fetch_related_rows, get_count_for_query, prepare_query, run_query, Query},
    schema::{build_schemas, get_entities_and_junctions, get_relations_for_table, without_tables, DatabaseSchema},
};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let db_path = cli
        .database
        .context("No database given; pass --database or set RELQUERY_DATABASE")?;
    let driver = SqliteDriver::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    let load_schemas = || -> Result<Vec<DatabaseSchema>> {
        let start = Instant::now();
        let schemas = build_schemas(&driver).context("Failed to introspect database")?;
        let schemas = without_tables(&schemas, &cli.ignore);
        info!(
            "Loaded {} schemas from {:?} in {:.1}ms",
            schemas.len(),
            db_path,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(schemas)
    };

    match cli.command {
        Commands::TestConnection => {
            driver.test_connection().context("Connection test failed")?;
            println!("Connected to {:?}", db_path);
        }

        Commands::Schema => {
            print_json(&load_schemas()?)?;
        }

        Commands::Relations { table, max_joins } => {
            let schemas = load_schemas()?;
            let related =
                get_relations_for_table(&schemas, &table.schema_name, &table.table_name, max_joins)?;
            print_json(&related)?;
        }

        Commands::Entities => {
            print_json(&get_entities_and_junctions(&load_schemas()?))?;
        }

        Commands::Prepare { query_file } => {
            let query = read_query(&query_file)?;
            let prepared = prepare_query(&load_schemas()?, &query)?;
            print_json(&prepared)?;
        }

        Commands::Run { query_file, limit } => {
            let mut query = read_query(&query_file)?;
            if limit.is_some() {
                query.limit = limit;
            }

            let schemas = load_schemas()?;
            let start = Instant::now();
            let result = run_query(&driver, &schemas, &query)?;
            info!(
                "Fetched {} rows in {:.1}s",
                result.rows.len(),
                start.elapsed().as_secs_f64()
            );
            print_json(&result)?;
        }

        Commands::Count { query_file } => {
            let query = read_query(&query_file)?;
            let result = get_count_for_query(&driver, &load_schemas()?, &query)?;
            print_json(&result)?;
        }

        Commands::Related {
            local,
            foreign,
            matches,
        } => {
            let local_row: Row = matches
                .into_iter()
                .map(|(column, value)| (column, Value::String(value)))
                .collect();
            let related = fetch_related_rows(&driver, &load_schemas()?, &local, &local_row, &foreign)?;
            print_json(&related)?;
        }
    }

    Ok(())
}

/// Read a JSON query from a file, or from stdin when the path is `-`
fn read_query(path: &Path) -> Result<Query> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read query from stdin")?;
        text
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read query file {:?}", path))?
    };

    serde_json::from_str(&text).with_context(|| format!("Invalid query in {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

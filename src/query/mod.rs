//! Compiling and running nested join queries.

pub mod condition;
pub mod emit;
pub mod prepare;
pub mod related;
pub mod run;
pub mod types;

pub use condition::*;
pub use emit::output_alias;
pub use prepare::{normalize, prepare_query, PreparedSql};
pub use related::{fetch_related_rows, RelatedRows};
pub use run::{get_count_for_query, run_query, CountMeta, CountResult, JoinRow, QueryMeta, QueryResult};
pub use types::*;

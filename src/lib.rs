pub mod cli;
pub mod driver;
pub mod error;
pub mod query;
pub mod schema;

pub use cli::{Cli, Commands};
pub use driver::{DatabaseDriver, DriverError, FakeDriver, SqliteDriver};
pub use error::{QueryError, Result};

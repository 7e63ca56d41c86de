pub mod build;
pub mod graph;
pub mod path;
pub mod relations;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use build::*;
pub use graph::*;
pub use path::*;
pub use relations::*;
pub use types::*;

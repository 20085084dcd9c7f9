//! CLI commands implementation

pub mod crawl;
pub mod query;
pub mod search;
pub mod stats;
pub mod vectorize;

pub use crawl::*;
pub use query::*;
pub use search::*;
pub use stats::*;
pub use vectorize::*;

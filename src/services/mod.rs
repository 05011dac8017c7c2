//! Report services on top of the view gateway.

pub mod aggregation;
pub mod catalog;
pub mod coverage;

pub use aggregation::Aggregator;
pub use catalog::{JobCatalog, JobMap};
pub use coverage::CoverageCache;

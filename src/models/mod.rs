//! Report models shaped into the external JSON contracts.

use serde::Deserialize;

pub mod build;
pub mod job;

pub use build::{MapBuild, ReduceBuild};
pub use job::Job;

/// Query parameters selecting a build or version prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildParams {
    pub build: Option<String>,
}

impl BuildParams {
    /// The build parameter, if present and not blank.
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}

/// Query parameters bounding a timeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineParams {
    pub start_key: Option<String>,
    pub end_key: Option<String>,
}

//! Build identifiers and aggregated build rows.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::views::rows::{DataKey, ReduceValue};

/// Separator between the version and the build number in a build identifier.
pub const BUILD_SEPARATOR: char = '-';

/// Priority reported for breakdown rows, which aggregate jobs of any priority.
pub const BREAKDOWN_PRIORITY: &str = "na";

/// Version part of a build identifier (`"2.0.0-100"` → `"2.0.0"`).
pub fn version_of(build: &str) -> &str {
    build
        .split_once(BUILD_SEPARATOR)
        .map_or(build, |(version, _)| version)
}

/// Template build names carry an `XX` placeholder (e.g. `0.0.0-XXXX`).
pub fn is_placeholder(name: &str) -> bool {
    name.to_uppercase().contains("XX")
}

/// A version is usable only when it ends in a digit.
pub fn is_valid_version(version: &str) -> bool {
    version.chars().last().is_some_and(|c| c.is_ascii_digit())
}

/// Pass/fail counts of one (build, platform, category) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MapBuild {
    pub version: String,
    pub passed: u64,
    pub failed: u64,
    pub category: String,
    pub platform: String,
    pub priority: String,
}

impl MapBuild {
    pub fn new(key: DataKey, stats: &ReduceValue) -> Self {
        MapBuild {
            version: key.build,
            passed: stats.abs_passed,
            failed: stats.abs_failed,
            category: key.category,
            platform: key.platform,
            priority: BREAKDOWN_PRIORITY.to_string(),
        }
    }
}

/// Build-level summary for the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ReduceBuild {
    pub version: String,
    pub abs_passed: u64,
    pub abs_failed: u64,
    pub rel_passed: f64,
    pub rel_failed: f64,
    /// Percentage of the version's expected jobs that ran for this build
    pub rel_executed: f64,
}

impl ReduceBuild {
    pub fn new(build: String, stats: ReduceValue, rel_executed: f64) -> Self {
        ReduceBuild {
            version: build,
            abs_passed: stats.abs_passed,
            abs_failed: stats.abs_failed,
            rel_passed: stats.rel_passed,
            rel_failed: stats.rel_failed,
            rel_executed,
        }
    }
}

/// Share of expected jobs that ran, in percent. Zero when nothing is expected.
pub fn relative_executed(ran: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    100.0 * ran as f64 / expected as f64
}

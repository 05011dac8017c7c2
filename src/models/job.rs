//! Job projection returned by the job and missing-job reports.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::views::rows::{CatalogEntry, DataKey, DataValue};

/// Result reported for a job that never ran for the requested build.
pub const MISSING_RESULT: &str = "NONE";

/// Build id reported for a job that never ran for the requested build.
pub const MISSING_BUILD_ID: i64 = -1;

/// One CI job, either as it ran for a build or as known from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    pub passed: u64,
    /// Always `passed + failed`
    pub total: u64,
    pub priority: String,
    pub name: String,
    pub result: String,
    pub url: String,
    /// Numeric id of the owning build, -1 when the job did not run
    pub bid: i64,
    /// Owning build identifier, empty when the job did not run
    pub version: String,
    pub platform: String,
    pub category: String,
}

impl Job {
    /// A job result as it ran for a build.
    pub fn from_run(key: DataKey, run: DataValue) -> Self {
        Job {
            passed: run.passed,
            total: run.total(),
            priority: run.priority,
            name: run.name,
            result: run.result,
            url: run.url,
            bid: run.build_id,
            version: key.build,
            platform: key.platform,
            category: key.category,
        }
    }

    /// A job known from the catalog, with no run attached.
    pub fn from_catalog(entry: CatalogEntry) -> Self {
        Job {
            passed: 0,
            total: 0,
            priority: entry.priority,
            name: entry.name,
            result: MISSING_RESULT.to_string(),
            url: entry.url,
            bid: MISSING_BUILD_ID,
            version: String::new(),
            platform: entry.platform,
            category: entry.category,
        }
    }
}

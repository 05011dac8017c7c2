//! Job catalog: the distinct jobs known for a build or a version.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Value, json};
use tracing::warn;

use crate::error::AppResult;
use crate::models::Job;
use crate::views::rows::{CatalogEntry, build_of_key};
use crate::views::{View, ViewGateway, ViewQuery, ViewRow};

/// Upper bound suffix capturing every build under a version prefix.
const VERSION_RANGE_SUFFIX: &str = "z";

/// Jobs keyed by name. Later rows overwrite earlier ones.
pub type JobMap = BTreeMap<String, Job>;

/// Read-only view of the jobs index.
#[derive(Clone)]
pub struct JobCatalog {
    views: ViewGateway,
}

impl JobCatalog {
    pub fn new(views: ViewGateway) -> Self {
        Self { views }
    }

    /// Distinct jobs that ran for exactly this build.
    pub async fn jobs_for_build(&self, build: &str) -> AppResult<JobMap> {
        if build.is_empty() {
            return Ok(JobMap::new());
        }
        let query = ViewQuery::exact(json!(build)).raw();
        let rows = self.views.query_with_retry(View::JobsByBuild, &query).await?;
        Ok(self.collect(&rows))
    }

    /// Distinct jobs that ran for any build of this version.
    pub async fn jobs_for_version(&self, version: &str) -> AppResult<JobMap> {
        if version.is_empty() {
            return Ok(JobMap::new());
        }
        let query = ViewQuery::range(
            json!(version),
            json!(format!("{}{}", version, VERSION_RANGE_SUFFIX)),
        )
        .exclusive_end()
        .raw();
        let rows = self.views.query_with_retry(View::JobsByBuild, &query).await?;
        Ok(self.collect(&rows))
    }

    /// Number of distinct jobs expected for a version.
    pub async fn expected_job_count(&self, version: &str) -> AppResult<u64> {
        Ok(self.jobs_for_version(version).await?.len() as u64)
    }

    /// Distinct job names per build for every build in `[start, end]`.
    pub async fn distinct_jobs_per_build(
        &self,
        start: &Value,
        end: &Value,
    ) -> AppResult<HashMap<String, u64>> {
        let query = ViewQuery::range(start.clone(), end.clone()).raw();
        let rows = self.views.query_with_retry(View::JobsByBuild, &query).await?;
        let layout = self.views.schema().catalog_layout();

        let mut names: HashMap<String, HashSet<String>> = HashMap::new();
        for row in &rows {
            let decoded = build_of_key(&row.key)
                .and_then(|build| Ok((build, CatalogEntry::decode(&row.value, &layout)?)));
            match decoded {
                Ok((build, entry)) => {
                    names.entry(build).or_default().insert(entry.name);
                }
                Err(e) => warn!("Skipping malformed job row {:?}: {}", row.key, e),
            }
        }

        Ok(names
            .into_iter()
            .map(|(build, jobs)| (build, jobs.len() as u64))
            .collect())
    }

    fn collect(&self, rows: &[ViewRow]) -> JobMap {
        let layout = self.views.schema().catalog_layout();
        let mut jobs = JobMap::new();
        for row in rows {
            match CatalogEntry::decode(&row.value, &layout) {
                Ok(entry) => {
                    jobs.insert(entry.name.clone(), Job::from_catalog(entry));
                }
                Err(e) => warn!("Skipping malformed job row {:?}: {}", row.key, e),
            }
        }
        jobs
    }
}

//! Aggregation engine turning view rows into coverage-aware reports.

use std::collections::BTreeMap;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::catalog::JobCatalog;
use super::coverage::CoverageCache;
use crate::error::{AppError, AppResult};
use crate::models::build::{is_placeholder, is_valid_version, relative_executed, version_of};
use crate::models::{Job, MapBuild, ReduceBuild};
use crate::views::rows::{DataKey, DataValue, ReduceValue, build_of_key};
use crate::views::{View, ViewGateway, ViewQuery};

/// Suffix bounding every build of a version prefix in the data index.
const BUILD_RANGE_SUFFIX: &str = "_";

/// Lowest possible version key.
const TIMELINE_START: &str = "";

/// Sorts after any real version string.
const TIMELINE_END: &str = "\u{fff0}";

/// Computes breakdowns, timelines and missing jobs, and owns the
/// expected-job-count cache.
#[derive(Clone)]
pub struct Aggregator {
    views: ViewGateway,
    catalog: JobCatalog,
    coverage: CoverageCache,
    default_release: Option<String>,
}

impl Aggregator {
    pub fn new(views: ViewGateway, default_release: Option<String>) -> Self {
        Self {
            catalog: JobCatalog::new(views.clone()),
            views,
            coverage: CoverageCache::new(),
            default_release,
        }
    }

    pub fn views(&self) -> &ViewGateway {
        &self.views
    }

    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    pub fn coverage(&self) -> &CoverageCache {
        &self.coverage
    }

    /// The requested release, or the configured default one.
    pub fn release_or_default(&self, requested: Option<&str>) -> AppResult<String> {
        requested
            .or(self.default_release.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::InvalidInput(
                    "build query parameter is required (no default release configured)"
                        .to_string(),
                )
            })
    }

    /// Every job result recorded for exactly this build.
    pub async fn build_jobs(&self, build: &str) -> AppResult<Vec<Job>> {
        let query = ViewQuery::range(
            json!([build]),
            json!([format!("{}{}", build, BUILD_RANGE_SUFFIX)]),
        )
        .raw();
        let rows = self.views.query_with_retry(View::DataByBuild, &query).await?;
        let layout = self.views.schema().map_layout();

        let mut jobs = Vec::new();
        for row in rows {
            let key = match DataKey::decode(&row.key) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping malformed data key {:?}: {}", row.key, e);
                    continue;
                }
            };
            if key.build != build {
                continue;
            }
            match DataValue::decode(&row.value, &layout) {
                Ok(run) => jobs.push(Job::from_run(key, run)),
                Err(e) => warn!("Skipping malformed job result for {}: {}", build, e),
            }
        }

        Ok(jobs)
    }

    /// Pass/fail counts per (build, platform, category) under a version prefix.
    pub async fn breakdown(&self, version: &str) -> AppResult<Vec<MapBuild>> {
        let query = ViewQuery::range(
            json!([version]),
            json!([format!("{}{}", version, BUILD_RANGE_SUFFIX)]),
        )
        .group_level(3);
        let rows = self.views.query_with_retry(View::DataByBuild, &query).await?;
        let layout = self.views.schema().reduce_layout();

        let mut builds = Vec::new();
        for row in rows {
            let stats = match ReduceValue::decode(&row.value, &layout) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!("Skipping unreduced breakdown row {:?}: {}", row.key, e);
                    continue;
                }
            };
            let key = match DataKey::decode(&row.key) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping malformed breakdown key {:?}: {}", row.key, e);
                    continue;
                }
            };
            if is_placeholder(&key.build) {
                continue;
            }
            builds.push(MapBuild::new(key, &stats));
        }

        Ok(builds)
    }

    /// Build-level pass/fail summaries between two keys, in index order.
    ///
    /// Empty bounds cover every version.
    pub async fn timeline(&self, start_key: &str, end_key: &str) -> AppResult<Vec<ReduceBuild>> {
        let (start, end) = timeline_bounds(start_key, end_key);

        // `{}` sorts after any string, so every row of the end build is included.
        let query = ViewQuery::range(json!([start]), json!([end, {}])).group_level(1);
        let rows = self.views.query_with_retry(View::DataByBuild, &query).await?;
        let jobs_per_build = self
            .catalog
            .distinct_jobs_per_build(&json!(start), &json!(end))
            .await?;
        let layout = self.views.schema().reduce_layout();

        let mut builds = Vec::new();
        for row in rows {
            let build = match build_of_key(&row.key) {
                Ok(build) => build,
                Err(e) => {
                    warn!("Skipping malformed timeline key {:?}: {}", row.key, e);
                    continue;
                }
            };
            if is_placeholder(&build) {
                debug!("skip placeholder: {}", build);
                continue;
            }

            let version = version_of(&build);
            if !is_valid_version(version) {
                info!("Skipping invalid version {}", version);
                continue;
            }

            let stats = match ReduceValue::decode(&row.value, &layout) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!("Skipping unreduced timeline row for {}: {}", build, e);
                    continue;
                }
            };

            self.coverage.record_version(version).await;
            let expected = self.expected_jobs(version).await?;

            let ran = jobs_per_build.get(&build).copied().unwrap_or(0);
            builds.push(ReduceBuild::new(
                build,
                stats,
                relative_executed(ran, expected),
            ));
        }

        Ok(builds)
    }

    /// Expected job count for a version, resolved and cached on first use.
    pub async fn expected_jobs(&self, version: &str) -> AppResult<u64> {
        if let Some(count) = self.coverage.expected(version).await {
            return Ok(count);
        }
        let count = self.catalog.expected_job_count(version).await?;
        Ok(self.coverage.fill_expected(version, count).await)
    }

    /// Jobs of the build's version that did not run for this build.
    ///
    /// Versions not seen by a timeline yet yield no result.
    pub async fn missing_jobs(&self, build: &str) -> AppResult<Vec<Job>> {
        let version = version_of(build);
        if self.coverage.expected(version).await.is_none() {
            debug!("No expected jobs tracked for version {}", version);
            return Ok(Vec::new());
        }

        let all_jobs = self.catalog.jobs_for_version(version).await?;
        let build_jobs = self.catalog.jobs_for_build(build).await?;

        Ok(all_jobs
            .into_iter()
            .filter(|(name, _)| !build_jobs.contains_key(name))
            .map(|(_, job)| job)
            .collect())
    }

    /// All versions seen so far.
    pub async fn all_versions(&self) -> BTreeMap<String, bool> {
        self.coverage.version_set().await
    }

    /// Recompute the expected job count of every tracked version.
    ///
    /// Failures are logged per version. Returns the number of versions refreshed.
    pub async fn refresh_expected_counts(&self) -> usize {
        let mut refreshed = 0;
        for version in self.coverage.tracked_versions().await {
            match self.catalog.expected_job_count(&version).await {
                Ok(count) => {
                    self.coverage.store_expected(&version, count).await;
                    refreshed += 1;
                }
                Err(e) => warn!("Failed to refresh expected jobs for {}: {}", version, e),
            }
        }
        refreshed
    }

    /// Start a background refresh of the expected job counts.
    pub fn trigger_refresh(&self) -> JoinHandle<()> {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let refreshed = aggregator.refresh_expected_counts().await;
            debug!("Refreshed expected job counts for {} versions", refreshed);
        })
    }

    /// Seed the version set with an unbounded timeline, then refresh counts
    /// in the background. Returns the number of timeline rows.
    pub async fn bootstrap(&self) -> AppResult<usize> {
        let rows = self.timeline("", "").await?;
        self.trigger_refresh();
        Ok(rows.len())
    }
}

/// Empty bounds cover every version.
fn timeline_bounds<'a>(start_key: &'a str, end_key: &'a str) -> (&'a str, &'a str) {
    let start = if start_key.is_empty() {
        TIMELINE_START
    } else {
        start_key
    };
    let end = if end_key.is_empty() {
        TIMELINE_END
    } else {
        end_key
    };
    (start, end)
}

//! Report API endpoints.


use actix_web::{HttpResponse, get, web};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{BuildParams, Job, MapBuild, ReduceBuild, TimelineParams};
use crate::services::Aggregator;

/// Configure report routes.
pub fn configure_report_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_jobs)
        .service(get_missing_jobs)
        .service(get_breakdown)
        .service(get_timeline)
        .service(get_versions);
}

fn required_build(params: &BuildParams) -> AppResult<&str> {
    params
        .build()
        .ok_or_else(|| AppError::InvalidInput("build query parameter is required".to_string()))
}

/// Every job result of one build.
///
/// GET /jobs?build=2.0.0-100
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Reports",
    params(
        ("build" = String, Query, description = "Build identifier")
    ),
    responses(
        (status = 200, description = "Jobs of the build", body = Vec<Job>),
        (status = 400, description = "Missing build", body = crate::error::ErrorResponse),
        (status = 502, description = "View service failure", body = crate::error::ErrorResponse),
        (status = 503, description = "Index unavailable", body = crate::error::ErrorResponse)
    )
)]
#[get("/jobs")]
pub async fn get_jobs(
    aggregator: web::Data<Aggregator>,
    query: web::Query<BuildParams>,
) -> AppResult<HttpResponse> {
    let build = required_build(&query)?;
    let jobs = aggregator.build_jobs(build).await?;
    Ok(HttpResponse::Ok().json(jobs))
}

/// Jobs of the build's version that did not run for the build.
///
/// GET /missing_jobs?build=2.0.0-100
#[utoipa::path(
    get,
    path = "/api/v1/missing_jobs",
    tag = "Reports",
    params(
        ("build" = String, Query, description = "Build identifier")
    ),
    responses(
        (status = 200, description = "Jobs that did not run, sorted by name", body = Vec<Job>),
        (status = 400, description = "Missing build", body = crate::error::ErrorResponse),
        (status = 502, description = "View service failure", body = crate::error::ErrorResponse),
        (status = 503, description = "Index unavailable", body = crate::error::ErrorResponse)
    )
)]
#[get("/missing_jobs")]
pub async fn get_missing_jobs(
    aggregator: web::Data<Aggregator>,
    query: web::Query<BuildParams>,
) -> AppResult<HttpResponse> {
    let build = required_build(&query)?;
    let jobs = aggregator.missing_jobs(build).await?;
    debug!("{} missing jobs for {}", jobs.len(), build);
    Ok(HttpResponse::Ok().json(jobs))
}

/// Pass/fail counts per build, platform and category under a version.
///
/// GET /breakdown?build=2.0.0
#[utoipa::path(
    get,
    path = "/api/v1/breakdown",
    tag = "Reports",
    params(
        ("build" = Option<String>, Query, description = "Version prefix (default: configured release)")
    ),
    responses(
        (status = 200, description = "Breakdown rows in index order", body = Vec<MapBuild>),
        (status = 400, description = "No build and no default release", body = crate::error::ErrorResponse),
        (status = 502, description = "View service failure", body = crate::error::ErrorResponse),
        (status = 503, description = "Index unavailable", body = crate::error::ErrorResponse)
    )
)]
#[get("/breakdown")]
pub async fn get_breakdown(
    aggregator: web::Data<Aggregator>,
    query: web::Query<BuildParams>,
) -> AppResult<HttpResponse> {
    let version = aggregator.release_or_default(query.build())?;
    let rows = aggregator.breakdown(&version).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Build-level summaries between two build keys.
///
/// GET /timeline?start_key=2.0.0-1&end_key=2.0.0-999
#[utoipa::path(
    get,
    path = "/api/v1/timeline",
    tag = "Reports",
    params(
        ("start_key" = Option<String>, Query, description = "First build (default: lowest)"),
        ("end_key" = Option<String>, Query, description = "Last build (default: highest)")
    ),
    responses(
        (status = 200, description = "Build summaries in index order", body = Vec<ReduceBuild>),
        (status = 502, description = "View service failure", body = crate::error::ErrorResponse),
        (status = 503, description = "Index unavailable", body = crate::error::ErrorResponse)
    )
)]
#[get("/timeline")]
pub async fn get_timeline(
    aggregator: web::Data<Aggregator>,
    query: web::Query<TimelineParams>,
) -> AppResult<HttpResponse> {
    let start = query.start_key.as_deref().unwrap_or_default();
    let end = query.end_key.as_deref().unwrap_or_default();
    let rows = aggregator.timeline(start, end).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Every version seen by a timeline so far.
#[utoipa::path(
    get,
    path = "/api/v1/versions",
    tag = "Reports",
    responses(
        (status = 200, description = "Known versions, each mapped to true", body = BTreeMap<String, bool>)
    )
)]
#[get("/versions")]
pub async fn get_versions(aggregator: web::Data<Aggregator>) -> HttpResponse {
    HttpResponse::Ok().json(aggregator.all_versions().await)
}

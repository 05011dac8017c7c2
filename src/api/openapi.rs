//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Greenboard Server",
        version = "0.1.0",
        description = "Aggregated CI job results per build and version, read from the report views"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Report endpoints
        api::reports::get_jobs,
        api::reports::get_missing_jobs,
        api::reports::get_breakdown,
        api::reports::get_timeline,
        api::reports::get_versions,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Reports
            models::Job,
            models::MapBuild,
            models::ReduceBuild,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Reports", description = "Job, breakdown and timeline reports")
    )
)]
pub struct ApiDoc;

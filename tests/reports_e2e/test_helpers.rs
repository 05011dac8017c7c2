//! Shared test helpers for report E2E tests.

use actix_web::{App, dev::ServiceResponse, http::StatusCode, test, web};
use greenboard_lib::api::{self, StaticDir};
use greenboard_lib::config::ViewSettings;
use greenboard_lib::middleware::RequestLogger;
use greenboard_lib::services::Aggregator;
use greenboard_lib::views::{
    CouchbaseViews, IndexSchema, JobDocument, MemoryViews, ViewGateway, ViewService,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Design document used by every test store.
pub const DESIGN_DOC: &str = "jenkins";

/// In-memory store with the design document installed.
pub fn memory_store(schema: IndexSchema, docs: Vec<JobDocument>) -> Arc<MemoryViews> {
    let views = Arc::new(MemoryViews::installed(schema, DESIGN_DOC));
    views.extend(docs);
    views
}

/// Aggregator over any view backend.
pub fn aggregator(
    service: Arc<dyn ViewService>,
    schema: IndexSchema,
    default_release: Option<&str>,
) -> Aggregator {
    Aggregator::new(
        ViewGateway::new(service, DESIGN_DOC, schema),
        default_release.map(str::to_string),
    )
}

/// REST client pointed at a view service base URL.
pub fn couchbase_views(base_url: &str, schema: IndexSchema) -> Arc<CouchbaseViews> {
    let settings = ViewSettings {
        url: base_url.to_string(),
        bucket: "jenkins".to_string(),
        design_doc: DESIGN_DOC.to_string(),
        username: None,
        password: None,
        schema,
        timeout_secs: 5,
    };
    Arc::new(CouchbaseViews::new(&settings).expect("Failed to build view client"))
}

/// The standard fixture: two builds of 2.0.0, where build 100 skipped job C.
pub fn standard_jobs() -> Vec<JobDocument> {
    vec![
        JobDocument::new("2.0.0-100", "linux", "core", "A").with_counts(10, 2),
        JobDocument::new("2.0.0-100", "linux", "core", "B").with_counts(5, 0),
        JobDocument::new("2.0.0-101", "linux", "core", "A").with_counts(10, 0),
        JobDocument::new("2.0.0-101", "linux", "core", "B").with_counts(5, 1),
        JobDocument::new("2.0.0-101", "windows", "ui", "C")
            .with_counts(3, 0)
            .with_priority("P0"),
    ]
}

/// Create a test app serving the report API and the landing page.
pub async fn create_test_app(
    aggregator: Aggregator,
    static_dir: Option<PathBuf>,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let mut app = App::new()
        .wrap(RequestLogger::default())
        .app_data(web::Data::new(aggregator))
        .service(
            web::scope("/api/v1")
                .configure(api::configure_health_routes)
                .configure(api::configure_report_routes),
        )
        .service(api::landing::index);

    if let Some(dir) = static_dir {
        app = app.app_data(web::Data::new(StaticDir(dir)));
    }

    test::init_service(app).await
}

/// GET a URI and decode the JSON body.
pub async fn get_json<S>(app: &S, uri: &str) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::get().uri(uri).to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// Names of the jobs in a job list body, in response order.
pub fn job_names(body: &Value) -> Vec<String> {
    body.as_array()
        .expect("expected a JSON array")
        .iter()
        .map(|job| job["Name"].as_str().unwrap_or_default().to_string())
        .collect()
}

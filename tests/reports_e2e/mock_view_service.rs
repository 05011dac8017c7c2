//! Mock view service for E2E tests.
//!
//! Starts an in-process HTTP server speaking the view REST API and answers
//! queries from a [`MemoryViews`] store.

use actix_web::{App, HttpResponse, HttpServer, get, put, web};
use greenboard_lib::views::{IndexSchema, MemoryViews, View, ViewError, ViewQuery, ViewService};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared state for the mock view service.
pub struct MockViewState {
    pub views: Arc<MemoryViews>,
    /// Raw query strings of every view request
    pub queries: Mutex<Vec<String>>,
    /// Answer every view query with a 404, even after installs
    pub index_broken: AtomicBool,
    /// Answer every view query with a 500
    pub failing: AtomicBool,
    pub installs: AtomicUsize,
}

type SharedState = web::Data<Arc<MockViewState>>;

fn view_by_name(name: &str) -> Option<View> {
    match name {
        "data_by_build" => Some(View::DataByBuild),
        "jobs_by_build" => Some(View::JobsByBuild),
        _ => None,
    }
}

fn parse_query(params: &HashMap<String, String>) -> ViewQuery {
    let json_param = |name: &str| {
        params
            .get(name)
            .map(|raw| serde_json::from_str::<Value>(raw).expect("key params must be JSON"))
    };

    let mut query = ViewQuery {
        key: json_param("key"),
        start_key: json_param("startkey"),
        end_key: json_param("endkey"),
        ..ViewQuery::default()
    };
    if params.get("inclusive_end").map(String::as_str) == Some("false") {
        query = query.exclusive_end();
    }
    if params.get("reduce").map(String::as_str) == Some("false") {
        query = query.raw();
    }
    if let Some(level) = params.get("group_level") {
        query = query.group_level(level.parse().expect("group_level must be numeric"));
    }
    query
}

fn error_body(status: u16, error: &str, reason: &str) -> HttpResponse {
    HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap())
        .json(json!({ "error": error, "reason": reason }))
}

#[get("/{bucket}/_design/{ddoc}/_view/{view}")]
async fn query_view(
    state: SharedState,
    path: web::Path<(String, String, String)>,
    params: web::Query<HashMap<String, String>>,
    req: actix_web::HttpRequest,
) -> HttpResponse {
    let (_bucket, ddoc, view) = path.into_inner();
    state
        .queries
        .lock()
        .unwrap()
        .push(req.query_string().to_string());

    if state.failing.load(Ordering::SeqCst) {
        return error_body(500, "internal_error", "view engine crashed");
    }
    if state.index_broken.load(Ordering::SeqCst) {
        return error_body(404, "not_found", "deleted");
    }
    let Some(view) = view_by_name(&view) else {
        return error_body(404, "not_found", "missing_named_view");
    };

    match state.views.query(&ddoc, view, &parse_query(&params)).await {
        Ok(rows) => {
            let rows: Vec<Value> = rows
                .into_iter()
                .map(|r| json!({ "key": r.key, "value": r.value }))
                .collect();
            HttpResponse::Ok().json(json!({ "total_rows": rows.len(), "rows": rows }))
        }
        Err(ViewError::IndexMissing { reason, .. }) => error_body(404, "not_found", &reason),
        Err(e) => error_body(500, "internal_error", &e.to_string()),
    }
}

#[put("/{bucket}/_design/{ddoc}")]
async fn put_design_doc(
    state: SharedState,
    path: web::Path<(String, String)>,
    body: web::Json<Value>,
) -> HttpResponse {
    let (_bucket, ddoc) = path.into_inner();
    assert!(body.get("views").is_some(), "design doc without views");
    state.installs.fetch_add(1, Ordering::SeqCst);
    state.views.put_design_doc(&ddoc, &body).await.unwrap();
    HttpResponse::Created().json(json!({ "ok": true, "id": format!("_design/{}", ddoc) }))
}

#[get("/{bucket}/_design/{ddoc}")]
async fn get_design_doc(state: SharedState, path: web::Path<(String, String)>) -> HttpResponse {
    let (_bucket, ddoc) = path.into_inner();
    match state.views.ping(&ddoc).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "views": {} })),
        Err(_) => error_body(404, "not_found", "missing"),
    }
}

/// Mock view service on an ephemeral port.
pub struct MockViewService {
    pub base_url: String,
    pub state: Arc<MockViewState>,
}

impl MockViewService {
    /// Start the mock view service with an installed design document.
    pub async fn start(schema: IndexSchema) -> Self {
        let views = Arc::new(MemoryViews::installed(schema, "jenkins"));
        let state = Arc::new(MockViewState {
            views,
            queries: Mutex::new(Vec::new()),
            index_broken: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            installs: AtomicUsize::new(0),
        });

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let state_data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state_data.clone()))
                .service(query_view)
                .service(put_design_doc)
                .service(get_design_doc)
        })
        .workers(1)
        .listen(listener)
        .expect("failed to listen")
        .disable_signals()
        .run();

        // Lives until the test runtime shuts down
        tokio::spawn(server);

        MockViewService { base_url, state }
    }

    pub fn views(&self) -> &MemoryViews {
        &self.state.views
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn install_count(&self) -> usize {
        self.state.installs.load(Ordering::SeqCst)
    }
}

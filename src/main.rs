//! Greenboard server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use greenboard_lib::api::{self, ApiDoc, StaticDir};
use greenboard_lib::config::Config;
use greenboard_lib::middleware::RequestLogger;
use greenboard_lib::services::Aggregator;
use greenboard_lib::views::{CouchbaseViews, MemoryViews, ViewGateway, ViewService};

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Check for --health-check flag (used by Docker HEALTHCHECK)
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, GB_COUCHBASE_URL must point at the view service");
            error!("  - GB_INDEX_SCHEMA must be 'v1' or 'v2' when set");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Greenboard Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    // Select the view backend
    let service: Arc<dyn ViewService> = if config.views.is_memory() {
        warn!("Using the in-memory view backend, reports will be empty");
        Arc::new(MemoryViews::installed(
            config.views.schema,
            &config.views.design_doc,
        ))
    } else {
        match CouchbaseViews::new(&config.views) {
            Ok(views) => Arc::new(views),
            Err(e) => {
                error!("Failed to create view client: {}", e);
                std::process::exit(1);
            }
        }
    };
    info!(
        "Views: {} bucket={} design_doc={} schema={}",
        config.views.url, config.views.bucket, config.views.design_doc, config.views.schema
    );

    let gateway = ViewGateway::new(service, config.views.design_doc.clone(), config.views.schema);
    let aggregator = Aggregator::new(gateway, config.default_release.clone());

    // Seed the version set; the server starts even when the store is down
    match aggregator.bootstrap().await {
        Ok(builds) => info!("Bootstrap timeline loaded {} builds", builds),
        Err(e) => warn!("Bootstrap failed, versions will load on demand: {}", e),
    }

    let bind_address = config.bind_address();
    let static_dir = config.static_dir.clone().map(StaticDir);
    let is_development = config.is_development();

    if let Some(ref dir) = static_dir {
        info!("Static file serving enabled from {:?}", dir.0);
    }

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let aggregator = web::Data::new(aggregator);

    // Start HTTP server
    let server = HttpServer::new(move || {
        let cors = if is_development {
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        } else {
            // Same-origin only
            Cors::default()
                .allowed_methods(vec!["GET", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        };

        let mut app = App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger::default())
            .app_data(aggregator.clone())
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_report_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .service(api::landing::index);

        if let Some(ref dir) = static_dir {
            app = app
                .app_data(web::Data::new(dir.clone()))
                .service(Files::new("/assets", dir.0.join("assets")).prefer_utf8(true));
        }

        app
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}

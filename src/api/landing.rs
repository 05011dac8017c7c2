//! Landing page.

use std::path::PathBuf;

use actix_files::NamedFile;
use actix_web::{HttpRequest, HttpResponse, get, web};

use crate::error::AppError;
use crate::services::Aggregator;

/// Directory holding `index.html` and its assets.
#[derive(Debug, Clone)]
pub struct StaticDir(pub PathBuf);

impl StaticDir {
    pub fn index(&self) -> PathBuf {
        self.0.join("index.html")
    }
}

/// Serve the landing page.
///
/// Every visit starts a background refresh of the expected job counts.
#[get("/")]
pub async fn index(
    req: HttpRequest,
    aggregator: web::Data<Aggregator>,
    static_dir: Option<web::Data<StaticDir>>,
) -> Result<HttpResponse, AppError> {
    aggregator.trigger_refresh();

    let dir = static_dir.ok_or_else(|| AppError::NotFound("Landing page".to_string()))?;
    let file = NamedFile::open_async(dir.index())
        .await
        .map_err(|_| AppError::NotFound("Landing page".to_string()))?;
    Ok(file.into_response(&req))
}

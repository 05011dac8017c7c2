//! Couchbase view REST client.
//!
//! Queries go to `{base}/{bucket}/_design/{ddoc}/_view/{view}` with JSON
//! encoded keys; design documents are installed with a `PUT` on
//! `{base}/{bucket}/_design/{ddoc}`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{STALE_MODE, View, ViewError, ViewQuery, ViewRow, ViewService};
use crate::config::ViewSettings;

/// HTTP connect timeout for the view service.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error codes meaning the design document or view has to be (re)installed.
const INDEX_ERRORS: &[&str] = &["not_found", "view_undefined", "invalid_design_document"];

#[derive(Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ViewRow>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    reason: Option<String>,
}

/// View service client for a Couchbase bucket.
#[derive(Clone)]
pub struct CouchbaseViews {
    base_url: String,
    bucket: String,
    username: Option<String>,
    password: Option<SecretString>,
    http_client: reqwest::Client,
}

impl CouchbaseViews {
    /// Create a client from settings.
    pub fn new(settings: &ViewSettings) -> Result<Self, ViewError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ViewError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Couchbase view client initialized (url={}, bucket={})",
            settings.url, settings.bucket
        );

        Ok(Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            bucket: settings.bucket.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            http_client,
        })
    }

    fn design_doc_url(&self, design_doc: &str) -> String {
        format!(
            "{}/{}/_design/{}",
            self.base_url,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(design_doc)
        )
    }

    fn view_url(&self, design_doc: &str, view: View, query: &ViewQuery) -> String {
        format!(
            "{}/_view/{}?{}",
            self.design_doc_url(design_doc),
            view.as_str(),
            encode_query(query)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        view: &str,
    ) -> Result<reqwest::Response, ViewError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ViewError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        Err(classify(status.as_u16(), &body, view))
    }
}

/// Render query parameters. Keys are JSON values, so they are serialized
/// before being URL encoded.
fn encode_query(query: &ViewQuery) -> String {
    let mut params: Vec<(&str, String)> = vec![("stale", STALE_MODE.to_string())];

    if let Some(key) = &query.key {
        params.push(("key", key.to_string()));
    } else {
        if let Some(start) = &query.start_key {
            params.push(("startkey", start.to_string()));
        }
        if let Some(end) = &query.end_key {
            params.push(("endkey", end.to_string()));
        }
    }
    params.push(("inclusive_end", query.inclusive_end.to_string()));

    if query.reduce {
        if let Some(level) = query.group_level {
            params.push(("group_level", level.to_string()));
        }
    } else {
        params.push(("reduce", "false".to_string()));
    }

    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Map an error response to a view error.
fn classify(status: u16, body: &ErrorBody, view: &str) -> ViewError {
    let reason = body
        .reason
        .clone()
        .or_else(|| body.error.clone())
        .unwrap_or_else(|| "no reason given".to_string());

    let index_error = body
        .error
        .as_deref()
        .is_some_and(|e| INDEX_ERRORS.contains(&e));

    if status == 404 || index_error {
        ViewError::IndexMissing {
            view: view.to_string(),
            reason,
        }
    } else {
        ViewError::Service { status, reason }
    }
}

#[async_trait]
impl ViewService for CouchbaseViews {
    async fn query(
        &self,
        design_doc: &str,
        view: View,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, ViewError> {
        let url = self.view_url(design_doc, view, query);
        debug!("View query: {}", url);

        let response = self
            .send(self.http_client.get(&url), &format!("{}/{}", design_doc, view))
            .await?;

        let body: ViewResponse = response
            .json()
            .await
            .map_err(|e| ViewError::InvalidResponse(e.to_string()))?;

        Ok(body.rows)
    }

    async fn put_design_doc(&self, design_doc: &str, definition: &Value) -> Result<(), ViewError> {
        let url = self.design_doc_url(design_doc);
        self.send(self.http_client.put(&url).json(definition), design_doc)
            .await?;
        Ok(())
    }

    async fn ping(&self, design_doc: &str) -> Result<(), ViewError> {
        let url = self.design_doc_url(design_doc);
        self.send(self.http_client.get(&url), design_doc).await?;
        Ok(())
    }
}

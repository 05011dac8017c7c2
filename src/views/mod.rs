//! View query gateway over the document store's materialized map/reduce indexes.
//!
//! Backends implement [`ViewService`]; [`ViewGateway`] adds install-on-miss
//! recovery of the design document for the configured [`IndexSchema`].

pub mod couchbase;
pub mod memory;
pub mod rows;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

pub use couchbase::CouchbaseViews;
pub use memory::{JobDocument, MemoryViews};
pub use rows::RowError;
pub use schema::IndexSchema;

/// Staleness tolerance sent with every query. Reporting is read-mostly and
/// bounded staleness is the only supported mode.
pub const STALE_MODE: &str = "update_after";

/// The two materialized indexes this service reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Key `[build, platform, category]`, per-job pass/fail values.
    DataByBuild,
    /// Key `build`, job metadata values, `_count` reduce.
    JobsByBuild,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataByBuild => "data_by_build",
            Self::JobsByBuild => "jobs_by_build",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of a single view query.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    /// Exact key match. Takes precedence over the range.
    pub key: Option<Value>,
    pub start_key: Option<Value>,
    pub end_key: Option<Value>,
    pub inclusive_end: bool,
    /// `None` reduces everything to a single row.
    pub group_level: Option<u32>,
    pub reduce: bool,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            key: None,
            start_key: None,
            end_key: None,
            inclusive_end: true,
            group_level: None,
            reduce: true,
        }
    }
}

impl ViewQuery {
    /// Query rows between two keys (inclusive end by default).
    pub fn range(start: Value, end: Value) -> Self {
        Self {
            start_key: Some(start),
            end_key: Some(end),
            ..Self::default()
        }
    }

    /// Query rows with exactly this key.
    pub fn exact(key: Value) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn group_level(mut self, level: u32) -> Self {
        self.group_level = Some(level);
        self
    }

    /// Return raw map rows instead of reduced rows.
    pub fn raw(mut self) -> Self {
        self.reduce = false;
        self
    }

    pub fn exclusive_end(mut self) -> Self {
        self.inclusive_end = false;
        self
    }
}

/// One `(key, value)` row as returned by the view service.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ViewRow {
    pub key: Value,
    pub value: Value,
}

impl ViewRow {
    pub fn new(key: Value, value: Value) -> Self {
        Self { key, value }
    }
}

/// View service failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ViewError {
    /// The service could not be reached.
    #[error("View service unreachable: {0}")]
    Connection(String),

    /// The design document or view is missing or does not match.
    #[error("Index {view} missing or corrupt: {reason}")]
    IndexMissing { view: String, reason: String },

    /// Any other error reported by the service.
    #[error("View service returned {status}: {reason}")]
    Service { status: u16, reason: String },

    /// The response body could not be parsed.
    #[error("Invalid view response: {0}")]
    InvalidResponse(String),
}

impl ViewError {
    pub fn is_index_missing(&self) -> bool {
        matches!(self, Self::IndexMissing { .. })
    }
}

/// A queryable view service holding the bucket's design documents.
#[async_trait]
pub trait ViewService: Send + Sync {
    /// Run a query against `view` of `design_doc`, returning rows in index order.
    async fn query(
        &self,
        design_doc: &str,
        view: View,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, ViewError>;

    /// Create or replace a design document. Must be idempotent.
    async fn put_design_doc(&self, design_doc: &str, definition: &Value) -> Result<(), ViewError>;

    /// Check that the design document is reachable.
    async fn ping(&self, design_doc: &str) -> Result<(), ViewError>;
}

/// Gateway to the report indexes of one bucket.
#[derive(Clone)]
pub struct ViewGateway {
    service: Arc<dyn ViewService>,
    design_doc: String,
    schema: IndexSchema,
}

impl ViewGateway {
    pub fn new(
        service: Arc<dyn ViewService>,
        design_doc: impl Into<String>,
        schema: IndexSchema,
    ) -> Self {
        Self {
            service,
            design_doc: design_doc.into(),
            schema,
        }
    }

    pub fn schema(&self) -> IndexSchema {
        self.schema
    }

    pub fn design_doc(&self) -> &str {
        &self.design_doc
    }

    /// Run one query attempt.
    ///
    /// When the index is missing or corrupt the canonical design document is
    /// installed and the first failure is still returned; the caller decides
    /// whether to try again.
    pub async fn query(&self, view: View, query: &ViewQuery) -> Result<Vec<ViewRow>, ViewError> {
        match self.service.query(&self.design_doc, view, query).await {
            Err(err) if err.is_index_missing() => {
                warn!(
                    "Query on {}/{} failed ({}), installing {} index definition",
                    self.design_doc, view, err, self.schema
                );
                self.install().await?;
                Err(err)
            }
            other => other,
        }
    }

    /// Run a query, trying exactly once more if the first attempt had to
    /// install the index definition.
    pub async fn query_with_retry(
        &self,
        view: View,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, ViewError> {
        match self.query(view, query).await {
            Err(err) if err.is_index_missing() => {
                info!("Retrying {}/{} after index install", self.design_doc, view);
                self.query(view, query).await
            }
            other => other,
        }
    }

    /// Install the canonical design document for the configured schema.
    pub async fn install(&self) -> Result<(), ViewError> {
        self.service
            .put_design_doc(&self.design_doc, &self.schema.design_document())
            .await?;
        info!("Installed design document {} ({})", self.design_doc, self.schema);
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), ViewError> {
        self.service.ping(&self.design_doc).await
    }
}

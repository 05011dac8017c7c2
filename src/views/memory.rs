//! In-process view service.
//!
//! Emulates the two report views over job documents held in memory: key
//! collation, ranges, group levels and the reduce function of each index
//! schema. Used by the test suites and for running the server without a
//! document store (`GB_COUCHBASE_URL=memory:`).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::schema::IndexSchema;
use super::{View, ViewError, ViewQuery, ViewRow, ViewService};

/// A job result document as stored in the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDocument {
    pub build: String,
    pub os: String,
    pub component: String,
    pub name: String,
    pub total_count: u64,
    pub fail_count: u64,
    pub priority: String,
    pub result: String,
    pub url: String,
    #[serde(rename = "build_id")]
    pub build_id: i64,
}

impl JobDocument {
    /// A passing single-test job.
    pub fn new(build: &str, os: &str, component: &str, name: &str) -> Self {
        let build_id = build
            .rsplit_once('-')
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or(0);

        Self {
            build: build.to_string(),
            os: os.to_string(),
            component: component.to_string(),
            name: name.to_string(),
            total_count: 1,
            fail_count: 0,
            priority: "P1".to_string(),
            result: "SUCCESS".to_string(),
            url: format!("http://ci.example/job/{}/", name),
            build_id,
        }
    }

    pub fn with_counts(mut self, total: u64, failed: u64) -> Self {
        self.total_count = total;
        self.fail_count = failed;
        self.result = if failed > 0 { "UNSTABLE" } else { "SUCCESS" }.to_string();
        self
    }

    pub fn with_priority(mut self, priority: &str) -> Self {
        self.priority = priority.to_string();
        self
    }

    pub fn with_result(mut self, result: &str) -> Self {
        self.result = result.to_string();
        self
    }

    fn passed(&self) -> u64 {
        self.total_count.saturating_sub(self.fail_count)
    }
}

#[derive(Default)]
struct MemoryState {
    docs: Vec<JobDocument>,
    design_docs: HashMap<String, Value>,
    installs: usize,
}

/// View service backed by an in-memory document list.
pub struct MemoryViews {
    schema: IndexSchema,
    state: RwLock<MemoryState>,
}

impl MemoryViews {
    /// Empty store without any design document installed.
    pub fn new(schema: IndexSchema) -> Self {
        Self {
            schema,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Store with the canonical design document already installed.
    pub fn installed(schema: IndexSchema, design_doc: &str) -> Self {
        let views = Self::new(schema);
        views
            .write()
            .design_docs
            .insert(design_doc.to_string(), schema.design_document());
        views
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, doc: JobDocument) {
        self.write().docs.push(doc);
    }

    pub fn extend(&self, docs: impl IntoIterator<Item = JobDocument>) {
        self.write().docs.extend(docs);
    }

    /// Drop a design document, as if the index had been deleted.
    pub fn remove_design_doc(&self, design_doc: &str) {
        self.write().design_docs.remove(design_doc);
    }

    pub fn is_installed(&self, design_doc: &str) -> bool {
        self.read().design_docs.contains_key(design_doc)
    }

    /// Number of design document installs performed so far.
    pub fn install_count(&self) -> usize {
        self.read().installs
    }

    fn emit(&self, view: View, doc: &JobDocument) -> ViewRow {
        match view {
            View::DataByBuild => {
                let key = json!([doc.build, doc.os, doc.component]);
                let value = match self.schema {
                    IndexSchema::V1 => json!([
                        -(doc.fail_count as i64),
                        doc.passed(),
                        doc.priority,
                        doc.name,
                        doc.result,
                        doc.url,
                        doc.build_id
                    ]),
                    IndexSchema::V2 => json!([
                        doc.passed(),
                        doc.fail_count,
                        doc.priority,
                        doc.name,
                        doc.result,
                        doc.url,
                        doc.build_id
                    ]),
                };
                ViewRow::new(key, value)
            }
            View::JobsByBuild => ViewRow::new(
                json!(doc.build),
                json!([doc.name, doc.os, doc.component, doc.url, doc.priority]),
            ),
        }
    }

    fn reduce(&self, view: View, values: &[&Value]) -> Value {
        match view {
            View::JobsByBuild => json!(values.len()),
            View::DataByBuild => {
                let layout = self.schema.map_layout();
                let magnitude = |v: &Value, idx: usize| {
                    v.get(idx)
                        .and_then(Value::as_i64)
                        .map(i64::unsigned_abs)
                        .unwrap_or(0)
                };
                let passed: u64 = values.iter().map(|v| magnitude(v, layout.passed)).sum();
                let failed: u64 = values.iter().map(|v| magnitude(v, layout.failed)).sum();
                let total = passed + failed;
                let rel = |n: u64| {
                    if total == 0 {
                        Value::Null
                    } else {
                        json!(100.0 * n as f64 / total as f64)
                    }
                };

                if self.schema.negates_failed() {
                    let rel_failed = if total == 0 {
                        Value::Null
                    } else {
                        json!(-100.0 * failed as f64 / total as f64)
                    };
                    json!([passed, -(failed as i64), rel(passed), rel_failed])
                } else {
                    json!([passed, failed, rel(passed), rel(failed)])
                }
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// View key collation: null < false < true < numbers < strings < arrays < objects.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| collate(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn in_range(key: &Value, query: &ViewQuery) -> bool {
    if let Some(exact) = &query.key {
        return collate(key, exact) == Ordering::Equal;
    }
    if let Some(start) = &query.start_key
        && collate(key, start) == Ordering::Less
    {
        return false;
    }
    if let Some(end) = &query.end_key {
        return match collate(key, end) {
            Ordering::Greater => false,
            Ordering::Equal => query.inclusive_end,
            Ordering::Less => true,
        };
    }
    true
}

fn group_key(key: &Value, level: Option<u32>) -> Value {
    match (level, key) {
        (None | Some(0), _) => Value::Null,
        (Some(n), Value::Array(items)) => Value::Array(items.iter().take(n as usize).cloned().collect()),
        (Some(_), other) => other.clone(),
    }
}

#[async_trait]
impl ViewService for MemoryViews {
    async fn query(
        &self,
        design_doc: &str,
        view: View,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, ViewError> {
        let state = self.read();
        let defined = state
            .design_docs
            .get(design_doc)
            .and_then(|doc| doc.get("views"))
            .and_then(|views| views.get(view.as_str()))
            .is_some();
        if !defined {
            return Err(ViewError::IndexMissing {
                view: format!("{}/{}", design_doc, view),
                reason: "missing".to_string(),
            });
        }

        let mut rows: Vec<ViewRow> = state
            .docs
            .iter()
            .map(|doc| self.emit(view, doc))
            .filter(|row| in_range(&row.key, query))
            .collect();
        rows.sort_by(|a, b| collate(&a.key, &b.key));

        if !query.reduce {
            return Ok(rows);
        }

        let mut reduced = Vec::new();
        let mut group: Option<(Value, Vec<&Value>)> = None;
        for row in &rows {
            let key = group_key(&row.key, query.group_level);
            match group.as_mut() {
                Some((current, values)) if collate(current, &key) == Ordering::Equal => {
                    values.push(&row.value);
                }
                _ => {
                    if let Some((current, values)) = group.take() {
                        reduced.push(ViewRow::new(current, self.reduce(view, &values)));
                    }
                    group = Some((key, vec![&row.value]));
                }
            }
        }
        if let Some((current, values)) = group {
            reduced.push(ViewRow::new(current, self.reduce(view, &values)));
        }

        Ok(reduced)
    }

    async fn put_design_doc(&self, design_doc: &str, definition: &Value) -> Result<(), ViewError> {
        let mut state = self.write();
        state
            .design_docs
            .insert(design_doc.to_string(), definition.clone());
        state.installs += 1;
        Ok(())
    }

    async fn ping(&self, design_doc: &str) -> Result<(), ViewError> {
        if self.is_installed(design_doc) {
            Ok(())
        } else {
            Err(ViewError::IndexMissing {
                view: design_doc.to_string(),
                reason: "missing".to_string(),
            })
        }
    }
}

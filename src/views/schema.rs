//! Versioned index schemas for the CI result views.
//!
//! Deployed view definitions have changed field order over time: the legacy
//! schema emitted the failed count first and negated, the current one emits
//! passed first. Every position lookup goes through a layout so callers never
//! hardcode tuple offsets.

use serde_json::{Value, json};

/// Positions of the fields in a `data_by_build` map value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapLayout {
    pub passed: usize,
    pub failed: usize,
    pub priority: usize,
    pub name: usize,
    pub result: usize,
    pub url: usize,
    pub build_id: usize,
}

impl MapLayout {
    /// Minimum tuple length needed to decode a row.
    pub fn width(&self) -> usize {
        [
            self.passed,
            self.failed,
            self.priority,
            self.name,
            self.result,
            self.url,
            self.build_id,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Positions of the fields in a `data_by_build` reduce value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceLayout {
    pub abs_passed: usize,
    pub abs_failed: usize,
    pub rel_passed: usize,
    pub rel_failed: usize,
}

impl ReduceLayout {
    pub fn width(&self) -> usize {
        [
            self.abs_passed,
            self.abs_failed,
            self.rel_passed,
            self.rel_failed,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Positions of the fields in a `jobs_by_build` map value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLayout {
    pub name: usize,
    pub platform: usize,
    pub category: usize,
    pub url: usize,
    pub priority: usize,
}

impl CatalogLayout {
    pub fn width(&self) -> usize {
        [
            self.name,
            self.platform,
            self.category,
            self.url,
            self.priority,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Reduce output is `[absPassed, absFailed, relPassed, relFailed]` in every schema.
pub const REDUCE_LAYOUT: ReduceLayout = ReduceLayout {
    abs_passed: 0,
    abs_failed: 1,
    rel_passed: 2,
    rel_failed: 3,
};

/// `jobs_by_build` values are `[name, os, component, url, priority]` in every schema.
pub const CATALOG_LAYOUT: CatalogLayout = CatalogLayout {
    name: 0,
    platform: 1,
    category: 2,
    url: 3,
    priority: 4,
};

const V1_MAP_LAYOUT: MapLayout = MapLayout {
    failed: 0,
    passed: 1,
    priority: 2,
    name: 3,
    result: 4,
    url: 5,
    build_id: 6,
};

const V2_MAP_LAYOUT: MapLayout = MapLayout {
    passed: 0,
    failed: 1,
    priority: 2,
    name: 3,
    result: 4,
    url: 5,
    build_id: 6,
};

const V1_DATA_MAP: &str = "function (doc, meta) { emit([doc.build, doc.os, doc.component], [-doc.failCount, doc.totalCount - doc.failCount, doc.priority, doc.name, doc.result, doc.url, doc.build_id]); }";

const V1_DATA_REDUCE: &str = "function (key, values, rereduce) { var pAbs = 0; var fAbs = 0; for (var i = 0; i < values.length; i++) { if (rereduce) { pAbs += values[i][0]; fAbs += values[i][1]; } else { pAbs += values[i][1]; fAbs += values[i][0]; } } var total = pAbs - fAbs; return [pAbs, fAbs, 100.0 * pAbs / total, 100.0 * fAbs / total]; }";

const V2_DATA_MAP: &str = "function (doc, meta) { emit([doc.build, doc.os, doc.component], [doc.totalCount - doc.failCount, doc.failCount, doc.priority, doc.name, doc.result, doc.url, doc.build_id]); }";

const V2_DATA_REDUCE: &str = "function (key, values, rereduce) { var pAbs = 0; var fAbs = 0; for (var i = 0; i < values.length; i++) { pAbs += values[i][0]; fAbs += values[i][1]; } var total = pAbs + fAbs; return [pAbs, fAbs, 100.0 * pAbs / total, 100.0 * fAbs / total]; }";

const JOBS_MAP: &str = "function (doc, meta) { emit(doc.build, [doc.name, doc.os, doc.component, doc.url, doc.priority]); }";

/// Index definition version deployed in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSchema {
    /// Failed count first and negated.
    V1,
    /// Passed count first, failed count positive.
    #[default]
    V2,
}

impl IndexSchema {
    /// Parse schema from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "v1" | "1" | "legacy" => Some(Self::V1),
            "v2" | "2" | "current" => Some(Self::V2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }

    /// Field positions of the `data_by_build` map value.
    pub fn map_layout(&self) -> MapLayout {
        match self {
            Self::V1 => V1_MAP_LAYOUT,
            Self::V2 => V2_MAP_LAYOUT,
        }
    }

    pub fn reduce_layout(&self) -> ReduceLayout {
        REDUCE_LAYOUT
    }

    pub fn catalog_layout(&self) -> CatalogLayout {
        CATALOG_LAYOUT
    }

    /// Whether failed counts are emitted negated.
    pub fn negates_failed(&self) -> bool {
        matches!(self, Self::V1)
    }

    /// Canonical design document installed when the index is missing or corrupt.
    pub fn design_document(&self) -> Value {
        let (map, reduce) = match self {
            Self::V1 => (V1_DATA_MAP, V1_DATA_REDUCE),
            Self::V2 => (V2_DATA_MAP, V2_DATA_REDUCE),
        };

        json!({
            "views": {
                "data_by_build": { "map": map, "reduce": reduce },
                "jobs_by_build": { "map": JOBS_MAP, "reduce": "_count" }
            }
        })
    }
}

impl std::fmt::Display for IndexSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Bounded result cache with whole-cache eviction
//!
//! Keyed by a fingerprint of (chart key, dataset identity proxies, rewritten
//! config, concrete filters). The dataset proxy is shape + column names, NOT
//! a content hash: two uploads with identical shape and columns but
//! different cell values collide and return the cached result. That
//! approximation is deliberate and preserved from the source system;
//! setting `cache_content_hash` hashes cell contents instead when exact
//! identity is required.
//!
//! Eviction is intentionally coarse: when an insert would exceed capacity
//! the whole map is cleared first. Not LRU — replacing this policy would
//! change observable behavior.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use qviz_common::Dataset;

use crate::strategies::JsonMap;

/// Shared, capacity-bounded envelope cache
pub struct ResultCache {
    capacity: usize,
    entries: Mutex<HashMap<String, Value>>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        ResultCache {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(fingerprint).cloned()
    }

    /// Insert under a single lock: capacity check, possible full clear, then
    /// the write. The clear-then-insert sequence must not interleave with
    /// another request's lookup.
    pub fn insert(&self, fingerprint: String, envelope: Value) {
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(&fingerprint) && entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "result cache full, clearing");
            entries.clear();
        }
        entries.insert(fingerprint, envelope);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity proxy for one dataset: name, shape and ordered column names,
/// plus a content digest when `content_hash` is set
fn dataset_proxy(dataset: &Dataset, content_hash: bool) -> Value {
    let mut proxy = json!({
        "name": dataset.name(),
        "rows": dataset.row_count(),
        "columns": dataset.column_count(),
        "column_names": dataset.columns(),
    });
    if content_hash {
        let mut hasher = Sha256::new();
        for row in dataset.rows() {
            for cell in row {
                hasher.update(cell.display().as_bytes());
                hasher.update(b"\x1f");
            }
            hasher.update(b"\x1e");
        }
        proxy["digest"] = json!(format!("{:x}", hasher.finalize()));
    }
    proxy
}

/// Request fingerprint over the chart key, dataset proxies, rewritten
/// config and concrete filters
pub fn fingerprint(
    chart_key: &str,
    datasets: &[&Dataset],
    config: &JsonMap,
    filters: &JsonMap,
    content_hash: bool,
) -> String {
    let identity = json!({
        "chart_key": chart_key,
        "datasets": datasets
            .iter()
            .map(|ds| dataset_proxy(ds, content_hash))
            .collect::<Vec<Value>>(),
        "config": config,
        "filters": filters,
    });
    let mut hasher = Sha256::new();
    hasher.update(identity.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

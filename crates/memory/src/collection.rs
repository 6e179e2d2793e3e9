//! A single JSONL-persisted record partition.
//!
//! Records are loaded into memory on open and flushed to disk on every
//! mutation, giving fast reads with durable writes. Each line is one
//! JSON-encoded [`StoredRecord`]; corrupted lines are skipped with a
//! warning so one bad write never takes the whole partition down.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use confide_core::error::MemoryError;

/// One stored record: caller-chosen id, raw document text, its embedding,
/// and scalar-only metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Equality filter over record metadata. Every key must match exactly.
pub type MetaFilter = Map<String, Value>;

/// Whether `metadata` satisfies `filter`.
pub fn matches_filter(metadata: &Map<String, Value>, filter: &MetaFilter) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

/// A named record partition backed by one JSONL file.
pub struct Collection {
    name: String,
    path: PathBuf,
    records: RwLock<Vec<StoredRecord>>,
}

impl Collection {
    /// Open (or create) the partition at `dir/<name>.jsonl`.
    pub fn open(name: &str, dir: &std::path::Path) -> Self {
        let path = dir.join(format!("{name}.jsonl"));
        let records = Self::load_from_disk(&path);
        debug!(collection = name, count = records.len(), "Collection loaded");
        Self {
            name: name.to_string(),
            path,
            records: RwLock::new(records),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn load_from_disk(path: &PathBuf) -> Vec<StoredRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet — start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted record line");
                    None
                }
            })
            .collect()
    }

    /// Flush all records to disk as JSONL.
    async fn flush(&self) -> Result<(), MemoryError> {
        let records = self.records.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in records.iter() {
            let line = serde_json::to_string(record)
                .map_err(|e| MemoryError::Storage(format!("Failed to serialize record: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write {}: {e}", self.path.display())))
    }

    /// Insert or replace by id. Write failures surface — a lost write is
    /// data loss, not a degradable feature.
    pub async fn upsert(&self, record: StoredRecord) -> Result<(), MemoryError> {
        {
            let mut records = self.records.write().await;
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        self.flush().await
    }

    /// Get by id. Never raises.
    pub async fn get(&self, id: &str) -> Option<StoredRecord> {
        let records = self.records.read().await;
        records.iter().find(|r| r.id == id).cloned()
    }

    /// List records matching the filter, in insertion order. Never raises.
    pub async fn list(&self, filter: Option<&MetaFilter>, limit: usize) -> Vec<StoredRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| filter.is_none_or(|f| matches_filter(&r.metadata, f)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// A full snapshot of records matching the filter, for ranking.
    pub async fn snapshot(&self, filter: Option<&MetaFilter>) -> Vec<StoredRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| filter.is_none_or(|f| matches_filter(&r.metadata, f)))
            .cloned()
            .collect()
    }

    /// Delete records matching the filter, returning how many were removed.
    /// Degrades to 0 on persistence failure (the read/delete path never
    /// surfaces storage errors).
    pub async fn delete_where(&self, filter: &MetaFilter) -> usize {
        let removed = {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|r| !matches_filter(&r.metadata, filter));
            before - records.len()
        };
        if removed > 0 {
            if let Err(e) = self.flush().await {
                warn!(collection = %self.name, error = %e, "Failed to persist deletion");
            }
        }
        removed
    }

    /// Record count. Never raises.
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, doc: &str, meta: &[(&str, Value)]) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            document: doc.into(),
            embedding: vec![1.0, 0.0],
            metadata: meta.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let col = Collection::open("messages", dir.path());

        col.upsert(record("m1", "first", &[])).await.unwrap();
        col.upsert(record("m1", "second", &[])).await.unwrap();

        assert_eq!(col.count().await, 1);
        assert_eq!(col.get("m1").await.unwrap().document, "second");
    }

    #[tokio::test]
    async fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let col = Collection::open("messages", dir.path());
            col.upsert(record("m1", "kept across reload", &[])).await.unwrap();
        }
        let col = Collection::open("messages", dir.path());
        assert_eq!(col.count().await, 1);
        assert_eq!(col.get("m1").await.unwrap().document, "kept across reload");
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"a\",\"document\":\"ok\"}\nnot json at all\n{\"id\":\"b\",\"document\":\"also ok\"}\n",
        )
        .unwrap();

        let col = Collection::open("messages", dir.path());
        assert_eq!(col.count().await, 2);
    }

    #[tokio::test]
    async fn delete_where_matches_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let col = Collection::open("messages", dir.path());
        col.upsert(record("a", "x", &[("channel_id", json!("c1"))])).await.unwrap();
        col.upsert(record("b", "y", &[("channel_id", json!("c1"))])).await.unwrap();
        col.upsert(record("c", "z", &[("channel_id", json!("c2"))])).await.unwrap();

        let mut filter = MetaFilter::new();
        filter.insert("channel_id".into(), json!("c1"));
        assert_eq!(col.delete_where(&filter).await, 2);
        assert_eq!(col.count().await, 1);
        assert!(col.get("c").await.is_some());
    }

    #[tokio::test]
    async fn list_respects_filter_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let col = Collection::open("self_context", dir.path());
        for i in 0..5 {
            col.upsert(record(&format!("r{i}"), "doc", &[("type", json!("consent"))]))
                .await
                .unwrap();
        }
        col.upsert(record("other", "doc", &[("type", json!("persona"))])).await.unwrap();

        let mut filter = MetaFilter::new();
        filter.insert("type".into(), json!("consent"));
        let items = col.list(Some(&filter), 3).await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|r| r.metadata["type"] == json!("consent")));
    }

    #[test]
    fn filter_requires_all_keys() {
        let rec = record("a", "x", &[("k1", json!("v1")), ("k2", json!(2))]);
        let mut filter = MetaFilter::new();
        filter.insert("k1".into(), json!("v1"));
        assert!(matches_filter(&rec.metadata, &filter));
        filter.insert("k2".into(), json!(3));
        assert!(!matches_filter(&rec.metadata, &filter));
    }
}

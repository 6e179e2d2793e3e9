//! The semantic store — four scoped collections with typed accessors.
//!
//! Collections: `messages` (every conversational turn), `self_context`
//! (personas, policy toggles, consent grants, ratings — single-key
//! last-write-wins records), `entities` (long-lived fact summaries about
//! participants), `archives` (ingested documents).
//!
//! Failure semantics: reads, lists, deletes, and counts degrade to empty
//! results — the assistant falls back to "no memory" rather than failing
//! the turn. Writes surface errors, since silently losing persona or
//! entity data is not safe.

use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use confide_core::error::MemoryError;
use confide_core::llm::LlmService;
use confide_core::message::MessageMeta;
use confide_core::retry::retry;

use crate::collection::{Collection, MetaFilter, StoredRecord};
use crate::ranking::{RankWeights, cosine_distance, fused_score};

/// The four logical collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Messages,
    SelfContext,
    Entities,
    Archives,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Messages => "messages",
            CollectionKind::SelfContext => "self_context",
            CollectionKind::Entities => "entities",
            CollectionKind::Archives => "archives",
        }
    }
}

/// One ranked retrieval result.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
}

/// A page of consent records for one subject.
#[derive(Debug, Clone, Default)]
pub struct ConsentPage {
    pub total: usize,
    pub items: Vec<StoredRecord>,
}

/// Coerce metadata to scalar-only values for storage: composite values
/// (arrays/objects) are serialized to JSON strings; everything else passes
/// through. The conversion is a store responsibility, transparent to
/// callers.
pub fn coerce_meta(meta: Map<String, Value>) -> Map<String, Value> {
    meta.into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Array(_) | Value::Object(_) => {
                    Value::String(serde_json::to_string(&v).unwrap_or_default())
                }
                other => other,
            };
            (k, v)
        })
        .collect()
}

/// Parse a CSV-stored set back out of a metadata value. Accepts either the
/// CSV string form or a JSON-string-encoded array (both occur on disk).
pub fn csv_set(value: Option<&Value>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let Some(value) = value else { return out };
    match value {
        Value::String(s) => {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(s) {
                for item in items {
                    if let Some(s) = item.as_str() {
                        out.insert(s.to_string());
                    }
                }
            } else {
                for part in s.split(',') {
                    let part = part.trim();
                    if !part.is_empty() {
                        out.insert(part.to_string());
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(s) = item.as_str() {
                    out.insert(s.to_string());
                }
            }
        }
        _ => {}
    }
    out
}

fn csv_join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

/// The semantic store.
pub struct MemoryStore {
    llm: Arc<dyn LlmService>,
    weights: RankWeights,
    messages: Collection,
    self_context: Collection,
    entities: Collection,
    archives: Collection,
}

impl MemoryStore {
    /// Open the store rooted at `dir`, creating collections as needed.
    pub fn open(dir: &Path, llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            weights: RankWeights::default(),
            messages: Collection::open("messages", dir),
            self_context: Collection::open("self_context", dir),
            entities: Collection::open("entities", dir),
            archives: Collection::open("archives", dir),
        }
    }

    /// Override the fused ranking weights (config-tunable).
    pub fn with_weights(mut self, weights: RankWeights) -> Self {
        self.weights = weights;
        self
    }

    fn collection(&self, kind: CollectionKind) -> &Collection {
        match kind {
            CollectionKind::Messages => &self.messages,
            CollectionKind::SelfContext => &self.self_context,
            CollectionKind::Entities => &self.entities,
            CollectionKind::Archives => &self.archives,
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let texts = vec![text.to_string()];
        let vectors = retry("store_embed", || self.llm.embed(&texts))
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::EmbeddingFailed("empty embedding response".into()))
    }

    // ── Generic contract ──

    /// Embed and store content under the given id. Replaces any existing
    /// record with that id. Write failures raise.
    pub async fn upsert(
        &self,
        kind: CollectionKind,
        id: &str,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), MemoryError> {
        let embedding = self.embed_one(content).await?;
        self.collection(kind)
            .upsert(StoredRecord {
                id: id.to_string(),
                document: content.to_string(),
                embedding,
                metadata: coerce_meta(metadata),
            })
            .await
    }

    /// Get by id. Never raises.
    pub async fn get(&self, kind: CollectionKind, id: &str) -> Option<StoredRecord> {
        self.collection(kind).get(id).await
    }

    /// Ranked retrieval: top `k` candidates by vector distance, re-ranked
    /// by the fused score. Never raises — embedding failure degrades to an
    /// empty result.
    pub async fn query(
        &self,
        kind: CollectionKind,
        text: &str,
        k: usize,
        filter: Option<&MetaFilter>,
    ) -> Vec<QueryHit> {
        let query_vec = match self.embed_one(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(collection = kind.as_str(), error = %e, "Query embedding failed; returning empty");
                return Vec::new();
            }
        };

        let candidates = self.collection(kind).snapshot(filter).await;

        // Vector pass: distance ascending, stable, truncated to k.
        let mut by_distance: Vec<(f32, StoredRecord)> = candidates
            .into_iter()
            .map(|r| (cosine_distance(&r.embedding, &query_vec), r))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
        by_distance.truncate(k);

        // Fusion pass: fused score descending, ties broken by vector rank.
        let mut ranked: Vec<(f32, usize, StoredRecord)> = by_distance
            .into_iter()
            .enumerate()
            .map(|(rank, (distance, r))| {
                (fused_score(self.weights, distance, text, &r.document), rank, r)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        ranked
            .into_iter()
            .map(|(score, _, r)| QueryHit {
                id: r.id,
                document: r.document,
                metadata: r.metadata,
                score,
            })
            .collect()
    }

    /// Delete matching records, returning the count. Never raises.
    pub async fn delete_where(&self, kind: CollectionKind, filter: &MetaFilter) -> usize {
        self.collection(kind).delete_where(filter).await
    }

    /// List matching records. Never raises.
    pub async fn list(
        &self,
        kind: CollectionKind,
        filter: Option<&MetaFilter>,
        limit: usize,
    ) -> Vec<StoredRecord> {
        self.collection(kind).list(filter, limit).await
    }

    /// Record count for one collection. Never raises.
    pub async fn count(&self, kind: CollectionKind) -> usize {
        self.collection(kind).count().await
    }

    /// Counts for all collections.
    pub async fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for kind in [
            CollectionKind::Messages,
            CollectionKind::SelfContext,
            CollectionKind::Entities,
            CollectionKind::Archives,
        ] {
            out.insert(kind.as_str(), self.count(kind).await);
        }
        out
    }

    // ── Messages ──

    pub async fn upsert_message(
        &self,
        content: &str,
        meta: &MessageMeta,
    ) -> Result<(), MemoryError> {
        let value = serde_json::to_value(meta)
            .map_err(|e| MemoryError::Storage(format!("meta serialization: {e}")))?;
        let Value::Object(map) = value else {
            return Err(MemoryError::Storage("message meta is not an object".into()));
        };
        self.upsert(CollectionKind::Messages, &meta.message_id, content, map)
            .await
    }

    /// Fused-rank retrieval over stored messages.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetaFilter>,
    ) -> Vec<QueryHit> {
        self.query(CollectionKind::Messages, query, k, filter).await
    }

    pub async fn list_messages(&self, filter: Option<&MetaFilter>, limit: usize) -> Vec<StoredRecord> {
        self.list(CollectionKind::Messages, filter, limit).await
    }

    pub async fn delete_messages(&self, filter: &MetaFilter) -> usize {
        self.delete_where(CollectionKind::Messages, filter).await
    }

    // ── Personas ──

    async fn get_self_context_doc(&self, key: &str) -> String {
        self.get(CollectionKind::SelfContext, key)
            .await
            .map(|r| r.document)
            .unwrap_or_default()
    }

    pub async fn set_persona_core(&self, text: &str) -> Result<(), MemoryError> {
        let mut meta = Map::new();
        meta.insert("type".into(), json!("persona"));
        meta.insert("scope".into(), json!("core"));
        self.upsert(CollectionKind::SelfContext, "persona:core", text, meta).await
    }

    pub async fn get_persona_core(&self) -> String {
        self.get_self_context_doc("persona:core").await
    }

    pub async fn set_persona_user(&self, user_id: &str, text: &str) -> Result<(), MemoryError> {
        let mut meta = Map::new();
        meta.insert("type".into(), json!("persona"));
        meta.insert("scope".into(), json!("user"));
        meta.insert("user_id".into(), json!(user_id));
        self.upsert(CollectionKind::SelfContext, &format!("persona:user:{user_id}"), text, meta)
            .await
    }

    pub async fn get_persona_user(&self, user_id: &str) -> String {
        self.get_self_context_doc(&format!("persona:user:{user_id}")).await
    }

    pub async fn set_persona_server(&self, guild_id: &str, text: &str) -> Result<(), MemoryError> {
        let mut meta = Map::new();
        meta.insert("type".into(), json!("persona"));
        meta.insert("scope".into(), json!("server"));
        meta.insert("guild_id".into(), json!(guild_id));
        self.upsert(CollectionKind::SelfContext, &format!("persona:server:{guild_id}"), text, meta)
            .await
    }

    pub async fn get_persona_server(&self, guild_id: &str) -> String {
        self.get_self_context_doc(&format!("persona:server:{guild_id}")).await
    }

    // ── Cross-channel policy toggle ──

    pub async fn set_cross_channel(&self, guild_id: &str, enabled: bool) -> Result<(), MemoryError> {
        let mut meta = Map::new();
        meta.insert("type".into(), json!("policy"));
        meta.insert("key".into(), json!("cross_channel_enabled"));
        meta.insert("value".into(), json!(enabled));
        meta.insert("guild_id".into(), json!(guild_id));
        self.upsert(
            CollectionKind::SelfContext,
            &format!("policy:crosschannel:{guild_id}"),
            &format!("cross_channel_enabled={enabled}"),
            meta,
        )
        .await
    }

    /// The stored toggle, or `None` when the server has never set one
    /// (callers apply the configured default).
    pub async fn get_cross_channel(&self, guild_id: &str) -> Option<bool> {
        self.get(CollectionKind::SelfContext, &format!("policy:crosschannel:{guild_id}"))
            .await
            .and_then(|r| r.metadata.get("value").and_then(Value::as_bool))
    }

    // ── Consent grants ──

    pub async fn set_consent(
        &self,
        subject_user_id: &str,
        scope: &str,
        target: &str,
        granted: bool,
    ) -> Result<(), MemoryError> {
        let mut meta = Map::new();
        meta.insert("type".into(), json!("consent"));
        meta.insert("subject_user_id".into(), json!(subject_user_id));
        meta.insert("scope".into(), json!(scope));
        meta.insert("target".into(), json!(target));
        meta.insert("granted".into(), json!(granted));
        meta.insert("decided_at".into(), json!(Utc::now().to_rfc3339()));
        self.upsert(
            CollectionKind::SelfContext,
            &format!("consent:{subject_user_id}:{scope}:{target}"),
            &format!("consent scope={scope} target={target} granted={granted}"),
            meta,
        )
        .await
    }

    /// A cached decision, if the subject has ever pressed allow or deny
    /// for this (scope, target). Timeouts are never cached.
    pub async fn get_consent(
        &self,
        subject_user_id: &str,
        scope: &str,
        target: &str,
    ) -> Option<bool> {
        self.get(
            CollectionKind::SelfContext,
            &format!("consent:{subject_user_id}:{scope}:{target}"),
        )
        .await
        .and_then(|r| r.metadata.get("granted").and_then(Value::as_bool))
    }

    /// Page through one subject's consent records. Degrades to empty.
    pub async fn list_consents_for_user(
        &self,
        subject_user_id: &str,
        page: usize,
        page_size: usize,
    ) -> ConsentPage {
        let mut filter = MetaFilter::new();
        filter.insert("type".into(), json!("consent"));
        filter.insert("subject_user_id".into(), json!(subject_user_id));

        let all = self.self_context.snapshot(Some(&filter)).await;
        let total = all.len();
        let offset = page.saturating_sub(1) * page_size;
        let items = all.into_iter().skip(offset).take(page_size).collect();
        ConsentPage { total, items }
    }

    // ── Ratings ──

    pub async fn set_rating(
        &self,
        guild_id: &str,
        message_id: &str,
        up: bool,
        note: Option<&str>,
    ) -> Result<(), MemoryError> {
        let mut meta = Map::new();
        meta.insert("type".into(), json!("rating"));
        meta.insert("guild_id".into(), json!(guild_id));
        meta.insert("message_id".into(), json!(message_id));
        meta.insert("up".into(), json!(up));
        meta.insert("note".into(), json!(note.unwrap_or_default()));
        self.upsert(
            CollectionKind::SelfContext,
            &format!("rating:{guild_id}:{message_id}"),
            &format!("rating up={up} note={}", note.unwrap_or_default()),
            meta,
        )
        .await
    }

    // ── Entities ──

    /// Upsert an entity record, normalizing its metadata: the tag set
    /// always includes "entity" (CSV-sorted), the channel set is
    /// CSV-sorted, `source` defaults to auto_revision, and `updated_at`
    /// is stamped. The normalized map is constructed in full before the
    /// write — never mutated in place.
    pub async fn upsert_entity(
        &self,
        entity_id: &str,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), MemoryError> {
        let mut meta = metadata;
        meta.entry("entity_id".to_string()).or_insert_with(|| json!(entity_id));

        let mut tags = csv_set(meta.get("tags"));
        tags.insert("entity".to_string());
        meta.insert("tags".into(), json!(csv_join(&tags)));

        let channels = csv_set(meta.get("channels"));
        if !channels.is_empty() {
            meta.insert("channels".into(), json!(csv_join(&channels)));
        }

        meta.entry("source".to_string()).or_insert_with(|| json!("auto_revision"));
        meta.entry("updated_at".to_string())
            .or_insert_with(|| json!(Utc::now().to_rfc3339()));

        self.upsert(CollectionKind::Entities, entity_id, content, meta).await
    }

    pub async fn get_entity(&self, entity_id: &str) -> Option<StoredRecord> {
        self.get(CollectionKind::Entities, entity_id).await
    }

    pub async fn search_entities(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetaFilter>,
    ) -> Vec<QueryHit> {
        self.query(CollectionKind::Entities, query, k, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubEmbedder;

    fn store(dir: &Path) -> MemoryStore {
        MemoryStore::open(dir, Arc::new(StubEmbedder::default()))
    }

    #[tokio::test]
    async fn coerce_meta_serializes_composites() {
        let mut meta = Map::new();
        meta.insert("tags".into(), json!(["a", "b"]));
        meta.insert("n".into(), json!(3));
        meta.insert("flag".into(), json!(true));
        meta.insert("name".into(), json!("x"));

        let coerced = coerce_meta(meta);
        assert_eq!(coerced["tags"], json!("[\"a\",\"b\"]"));
        assert_eq!(coerced["n"], json!(3));
        assert_eq!(coerced["flag"], json!(true));
        assert_eq!(coerced["name"], json!("x"));
    }

    #[test]
    fn csv_set_roundtrips_both_forms() {
        assert_eq!(
            csv_set(Some(&json!("b,a, c"))),
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            csv_set(Some(&json!("[\"x\",\"y\"]"))),
            ["x", "y"].iter().map(|s| s.to_string()).collect()
        );
        assert!(csv_set(None).is_empty());
    }

    #[tokio::test]
    async fn persona_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.set_persona_core("be concise").await.unwrap();
        store.set_persona_user("u1", "prefers bullet points").await.unwrap();
        store.set_persona_server("g1", "formal tone").await.unwrap();

        assert_eq!(store.get_persona_core().await, "be concise");
        assert_eq!(store.get_persona_user("u1").await, "prefers bullet points");
        assert_eq!(store.get_persona_server("g1").await, "formal tone");
        // absent persona degrades to empty
        assert_eq!(store.get_persona_user("nobody").await, "");
    }

    #[tokio::test]
    async fn cross_channel_toggle_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert_eq!(store.get_cross_channel("g1").await, None);
        store.set_cross_channel("g1", true).await.unwrap();
        assert_eq!(store.get_cross_channel("g1").await, Some(true));
        store.set_cross_channel("g1", false).await.unwrap();
        assert_eq!(store.get_cross_channel("g1").await, Some(false));
    }

    #[tokio::test]
    async fn consent_roundtrip_and_paging() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert_eq!(store.get_consent("u1", "g1", "email").await, None);
        store.set_consent("u1", "g1", "email", true).await.unwrap();
        store.set_consent("u1", "g1", "phone", false).await.unwrap();
        store.set_consent("u2", "g1", "email", true).await.unwrap();

        assert_eq!(store.get_consent("u1", "g1", "email").await, Some(true));
        assert_eq!(store.get_consent("u1", "g1", "phone").await, Some(false));

        let page = store.list_consents_for_user("u1", 1, 10).await;
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);

        let page2 = store.list_consents_for_user("u1", 2, 1).await;
        assert_eq!(page2.total, 2);
        assert_eq!(page2.items.len(), 1);
    }

    #[tokio::test]
    async fn entity_upsert_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut meta = Map::new();
        meta.insert("kind".into(), json!("user"));
        meta.insert("channels".into(), json!("c2,c1"));
        store
            .upsert_entity("user:123", "- likes rust\n- plays chess", meta)
            .await
            .unwrap();

        let rec = store.get_entity("user:123").await.unwrap();
        assert!(rec.document.starts_with("- "));
        assert_eq!(rec.metadata["entity_id"], json!("user:123"));
        let tags = csv_set(rec.metadata.get("tags"));
        assert!(tags.contains("entity"));
        assert_eq!(rec.metadata["channels"], json!("c1,c2"));
        assert_eq!(rec.metadata["source"], json!("auto_revision"));
        assert!(rec.metadata["updated_at"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn retrieve_ranks_by_fused_score() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        // StubEmbedder embeds by token-hash buckets, so identical texts get
        // identical vectors and share tokens lexically.
        for (id, text) in [
            ("m1", "the cat sat on the mat"),
            ("m2", "quarterly finance report numbers"),
            ("m3", "cat pictures from yesterday"),
        ] {
            let meta = MessageMeta::user(id, confide_core::Scope::channel("g", "c"), "u");
            store.upsert_message(text, &meta).await.unwrap();
        }

        let hits = store.retrieve("cat pictures", 2, None).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "m3");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn retrieve_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for i in 0..6 {
            let meta = MessageMeta::user(
                format!("m{i}"),
                confide_core::Scope::channel("g", "c"),
                "u",
            );
            store.upsert_message("identical document text", &meta).await.unwrap();
        }

        let first: Vec<String> = store.retrieve("document", 4, None).await.into_iter().map(|h| h.id).collect();
        let second: Vec<String> = store.retrieve("document", 4, None).await.into_iter().map(|h| h.id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[tokio::test]
    async fn retrieve_filters_by_channel() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let m1 = MessageMeta::user("m1", confide_core::Scope::channel("g", "c1"), "u");
        let m2 = MessageMeta::user("m2", confide_core::Scope::channel("g", "c2"), "u");
        store.upsert_message("same words here", &m1).await.unwrap();
        store.upsert_message("same words here", &m2).await.unwrap();

        let mut filter = MetaFilter::new();
        filter.insert("channel_id".into(), json!("c1"));
        let hits = store.retrieve("words", 10, Some(&filter)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "m1");
    }

    #[tokio::test]
    async fn embedding_failure_degrades_query_but_fails_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            MemoryStore::open(dir.path(), Arc::new(crate::testing::FailingEmbedder));

        let meta = MessageMeta::user("m1", confide_core::Scope::direct(), "u");
        assert!(store.upsert_message("text", &meta).await.is_err());
        assert!(store.retrieve("text", 5, None).await.is_empty());
    }

    #[tokio::test]
    async fn counts_cover_all_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.set_persona_core("x").await.unwrap();

        let counts = store.counts().await;
        assert_eq!(counts["self_context"], 1);
        assert_eq!(counts["messages"], 0);
        assert_eq!(counts["entities"], 0);
        assert_eq!(counts["archives"], 0);
    }
}

//! Scoped semantic memory for the assistant.
//!
//! Records live in JSONL-backed collections and are retrieved with a fused
//! vector + lexical ranking. [`MemoryStore`] is the only type the rest of
//! the workspace talks to; collections and ranking are implementation
//! detail, exported for tooling.

pub mod collection;
pub mod ranking;
pub mod store;

#[cfg(test)]
mod testing;

pub use collection::{Collection, MetaFilter, StoredRecord, matches_filter};
pub use ranking::{RankWeights, cosine_distance, fused_score, lexical_overlap, similarity_from_distance};
pub use store::{CollectionKind, ConsentPage, MemoryStore, QueryHit, coerce_meta, csv_set};

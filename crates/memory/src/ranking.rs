//! Retrieval ranking — cosine distance fused with lexical overlap.
//!
//! Pure functions; the store applies them over candidate snapshots.
//! Ranking is deterministic for unchanged data: ties in fused score fall
//! back to the original vector rank.

/// Weights for the fused score. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub vector: f32,
    pub lexical: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self { vector: 0.8, lexical: 0.2 }
    }
}

/// Cosine distance between two vectors, in [0, 2].
///
/// Returns 1.0 (orthogonal) if either vector is empty, zero, or the
/// lengths mismatch — such records rank behind genuine matches without
/// poisoning the ordering.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 1.0;
    }

    (1.0 - dot / denom) as f32
}

/// Normalize a cosine distance to a similarity in [0, 1]:
/// `1 - clamp(distance, 0, 2) / 2`.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - distance.clamp(0.0, 2.0) / 2.0
}

/// Fraction of query tokens present in the document:
/// `|query ∩ doc| / |query|` over lowercased whitespace-split words.
/// Empty token sets score 0.
pub fn lexical_overlap(query: &str, document: &str) -> f32 {
    use std::collections::HashSet;

    let qset: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if qset.is_empty() {
        return 0.0;
    }
    let dset: HashSet<String> = document.split_whitespace().map(str::to_lowercase).collect();
    if dset.is_empty() {
        return 0.0;
    }

    let overlap = qset.intersection(&dset).count();
    overlap as f32 / qset.len() as f32
}

/// The fused retrieval score.
pub fn fused_score(weights: RankWeights, distance: f32, query: &str, document: &str) -> f32 {
    weights.vector * similarity_from_distance(distance)
        + weights.lexical * lexical_overlap(query, document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = vec![1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_unit_distance() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_have_distance_two() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_vectors_rank_neutral() {
        assert_eq!(cosine_distance(&[], &[]), 1.0);
        assert_eq!(cosine_distance(&[1.0, 2.0], &[1.0]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 2.0]), 1.0);
    }

    #[test]
    fn similarity_normalization() {
        assert!((similarity_from_distance(0.0) - 1.0).abs() < 1e-6);
        assert!((similarity_from_distance(1.0) - 0.5).abs() < 1e-6);
        assert!(similarity_from_distance(2.0).abs() < 1e-6);
        // out-of-range distances clamp
        assert!((similarity_from_distance(-1.0) - 1.0).abs() < 1e-6);
        assert!(similarity_from_distance(5.0).abs() < 1e-6);
    }

    #[test]
    fn lexical_overlap_counts_query_tokens() {
        let score = lexical_overlap("rust memory store", "the Rust semantic STORE");
        // "rust" and "store" of 3 query tokens
        assert!((score - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn lexical_overlap_empty_sets_score_zero() {
        assert_eq!(lexical_overlap("", "anything"), 0.0);
        assert_eq!(lexical_overlap("anything", ""), 0.0);
        assert_eq!(lexical_overlap("   ", "  "), 0.0);
    }

    #[test]
    fn fused_score_weights_both_signals() {
        let w = RankWeights::default();
        // perfect vector match, no lexical overlap
        let s1 = fused_score(w, 0.0, "alpha", "beta");
        assert!((s1 - 0.8).abs() < 1e-6);
        // orthogonal vectors, full lexical overlap
        let s2 = fused_score(w, 1.0, "alpha", "alpha");
        assert!((s2 - (0.8 * 0.5 + 0.2)).abs() < 1e-6);
    }
}

//! In-application vector similarity ranking for knowledge-base search.
//!
//! The ranking is a plain function over candidate rows so the brute-force
//! scan can be replaced by an indexed nearest-neighbor backend without
//! touching the search handlers.

/// Cosine similarity in [-1, 1]. Mismatched lengths or zero-norm vectors
/// score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Rank `items` against `query`, keeping scores at or above `threshold`,
/// best first. Ties keep the input order.
pub fn rank_by_similarity<T>(
    items: Vec<T>,
    query: &[f64],
    threshold: f64,
    embedding_of: impl Fn(&T) -> &[f64],
) -> Vec<(T, f64)> {
    let mut scored: Vec<(T, f64)> = items
        .into_iter()
        .filter_map(|item| {
            let score = cosine_similarity(embedding_of(&item), query);
            (score >= threshold).then_some((item, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.5, 0.25, -0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn mismatched_or_zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn ranking_filters_by_threshold_and_sorts_descending() {
        let items = vec![
            ("opposite", vec![-1.0, 0.0]),
            ("exact", vec![1.0, 0.0]),
            ("close", vec![0.9, 0.1]),
            ("unrelated", vec![0.0, 1.0]),
        ];

        let ranked = rank_by_similarity(items, &[1.0, 0.0], 0.7, |item| &item.1);
        let names: Vec<&str> = ranked.iter().map(|(item, _)| item.0).collect();
        assert_eq!(names, vec!["exact", "close"]);
        assert!(ranked[0].1 > ranked[1].1);
    }
}

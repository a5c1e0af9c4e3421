use crate::models::ScoreKind;

/// Score `chunk` against `query` under `kind`.
///
/// Vectors that cannot be compared (empty, different lengths, zero norm,
/// non-finite result) get `kind.worst()` instead of a NaN.
pub fn score(kind: ScoreKind, query: &[f32], chunk: &[f32]) -> f32 {
    let value = match kind {
        ScoreKind::CosineSimilarity => cosine_similarity(query, chunk),
        ScoreKind::CosineDistance => cosine_similarity(query, chunk).map(|s| 1.0 - s),
        ScoreKind::EuclideanDistance => euclidean_distance(query, chunk),
    };
    match value {
        Some(v) if v.is_finite() => v,
        _ => kind.worst(),
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        None
    } else {
        Some(dot / denom)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = [0.3, 0.4, 0.5];
        assert!((score(ScoreKind::CosineSimilarity, &v, &v) - 1.0).abs() < 1e-6);
        assert!(score(ScoreKind::CosineDistance, &v, &v).abs() < 1e-6);
        assert!(score(ScoreKind::EuclideanDistance, &v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(score(ScoreKind::CosineSimilarity, &a, &b).abs() < 1e-6);
        assert!((score(ScoreKind::CosineDistance, &a, &b) - 1.0).abs() < 1e-6);
        assert!((score(ScoreKind::EuclideanDistance, &a, &b) - 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_worst() {
        let q = [0.5, 0.5];
        let zero = [0.0, 0.0];
        assert_eq!(score(ScoreKind::CosineSimilarity, &q, &zero), 0.0);
        assert_eq!(score(ScoreKind::CosineDistance, &q, &zero), f32::MAX);
        // Euclidean distance to the origin is well defined.
        assert!((score(ScoreKind::EuclideanDistance, &q, &zero) - 0.5f32.hypot(0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_scores_worst() {
        let q = [1.0, 0.0, 0.0];
        let c = [1.0, 0.0];
        assert_eq!(score(ScoreKind::CosineSimilarity, &q, &c), 0.0);
        assert_eq!(score(ScoreKind::EuclideanDistance, &q, &c), f32::MAX);
    }
}

//! Cosine similarity over embedding vectors.

/// `dot(a, b) / (‖a‖ · ‖b‖)`, clamped to `[-1, 1]`.
///
/// Returns `0.0` when either norm is (near) zero — never NaN. Callers are
/// responsible for rejecting mixed-dimension inputs before scoring; see the
/// vector store's dimension check.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine over mixed dimensions");
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn identical_vectors_score_one() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(cosine_similarity(&vec, &vec), 1.0));
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert!(approx_eq(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0));
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = [0.3, -0.7, 0.2];
        let b = [0.9, 0.1, -0.4];
        assert!(approx_eq(cosine_similarity(&a, &b), cosine_similarity(&b, &a)));
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        assert!(approx_eq(cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]), -1.0));
    }
}

//! Vector math used by the similarity search.
//!
//! Both routines are pure functions over `f32` slices. [`cosine_similarity`]
//! takes precomputed magnitudes so a full-scan search computes the query
//! magnitude once and reuses the per-document magnitudes cached at insertion.

/// Euclidean norm of `v`. Returns 0 for an empty slice.
///
/// Squares are summed in `f64`, which cannot underflow or overflow for any
/// finite `f32` component. The result only overflows to infinity when the
/// norm itself exceeds `f32::MAX`.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt() as f32
}

fn is_usable(magnitude: f32) -> bool {
    magnitude > 0.0 && magnitude.is_finite()
}

/// Cosine similarity between `a` and `b` given their magnitudes.
///
/// The dot product runs over the shorter of the two vectors, so vectors of
/// different length are compared on their common prefix. A zero, NaN or
/// infinite magnitude on either side yields 0. The result is clamped into
/// `[-1, 1]` to absorb floating point rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32], magnitude_a: f32, magnitude_b: f32) -> f32 {
    if !is_usable(magnitude_a) || !is_usable(magnitude_b) {
        return 0.0;
    }

    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let similarity = dot_product / (f64::from(magnitude_a) * f64::from(magnitude_b));

    if similarity.is_nan() {
        0.0
    } else {
        similarity.clamp(-1.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b, magnitude(a), magnitude(b))
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(&[]), 0.0);
        assert_eq!(magnitude(&[3.0, 4.0]), 5.0);
        assert_eq!(magnitude(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_identity_and_symmetry() {
        let a = [0.3, -1.2, 4.5, 0.01];
        let b = [1.0, 2.0, -0.5, 3.0];

        assert!((cosine(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_zero_not_nan() {
        let zero = [0.0, 0.0, 0.0];
        let score = cosine(&zero, &[1.0, 2.0, 3.0]);
        assert_eq!(score, 0.0);
        assert!(!score.is_nan());
        assert_eq!(cosine(&[], &[1.0]), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_use_common_prefix() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0, 5.0];
        let expected = 1.0 / magnitude(&b);
        assert!((cosine(&a, &b) - expected).abs() < 1e-6);
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    #[test]
    fn test_tiny_and_huge_components() {
        let tiny = [1e-25, 0.0];
        assert!((magnitude(&tiny) - 1e-25).abs() < 1e-31);
        assert!((cosine(&tiny, &tiny) - 1.0).abs() < 1e-6);

        let subnormal = [1e-40, 1e-40];
        assert!(magnitude(&subnormal) > 0.0);
        assert!((cosine(&subnormal, &subnormal) - 1.0).abs() < 1e-3);

        let huge = [1e20, 0.0];
        assert_eq!(magnitude(&huge), 1e20);
        assert!((cosine(&huge, &huge) - 1.0).abs() < 1e-6);
        assert!((cosine(&huge, &tiny) - 1.0).abs() < 1e-6);
        assert!((cosine(&huge, &[-1e-30, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_overflowing_magnitude_scores_zero() {
        let max = [f32::MAX, f32::MAX];
        assert!(magnitude(&max).is_infinite());

        let score = cosine(&max, &[1.0, 1.0]);
        assert_eq!(score, 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0], f32::NAN, 1.0), 0.0);
    }

    #[test]
    fn test_scenario_scores() {
        let query = [1.0, 0.0];
        let c = [0.9, 0.1];
        let score = cosine(&query, &c);
        assert!((score - 0.99388).abs() < 1e-4);
    }
}

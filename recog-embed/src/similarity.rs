use crate::error::EmbedError;

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
///
/// Sums are accumulated in f64 and the result is clamped to absorb rounding.
/// Unequal lengths and zero-norm inputs are errors rather than a NaN, so a
/// score can always be ordered against another score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbedError> {
    if a.len() != b.len() {
        return Err(EmbedError::DimensionMismatch {
            expected: b.len(),
            got: a.len(),
        });
    }
    if a.is_empty() {
        return Err(EmbedError::Empty);
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(EmbedError::ZeroNorm);
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !sim.is_finite() {
        return Err(EmbedError::ZeroNorm);
    }
    Ok(sim.clamp(-1.0, 1.0) as f32)
}

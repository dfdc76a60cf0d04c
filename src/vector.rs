//! Pure vector math over embedding slices.
//!
//! No I/O and no allocation beyond [`normalize`] — everything here is
//! independently testable and shared by the cache, service, and similarity
//! modules.

use crate::error::{Error, Result};

/// Cosine similarity between two vectors, clamped to `[-1, 1]`.
///
/// Requires equal, non-zero lengths; returns [`Error::DimensionMismatch`]
/// otherwise. If either vector has zero magnitude the result is `0.0` rather
/// than NaN, so downstream ranking stays defined for all-zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);

    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }

    // Clamp absorbs floating-point drift on near-parallel vectors.
    Ok((dot / (mag_a * mag_b)).clamp(-1.0, 1.0))
}

/// Dot product of two equal-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Euclidean (L2) magnitude.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = magnitude(v);
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn check_dims(a: &[f32], b: &[f32]) -> Result<()> {
    if a.is_empty() || a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

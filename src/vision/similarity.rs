//! Edit-distance similarity
//!
//! Similarity is measured relative to the length of the reference string, so
//! `similarity(a, b)` and `similarity(b, a)` differ whenever the lengths do.
//! Acceptance thresholds in the matcher are tuned against this asymmetry.

use strsim::levenshtein;

/// Normalized similarity of `candidate` against `reference`, in `[0, 1]`.
///
/// Computes `(len(reference) + 1 - d) / (len(reference) + 1)` where `d` is the
/// Levenshtein distance. Lengths are counted in chars. Values that would go
/// negative (candidate much longer than the reference) are floored at 0.
pub fn similarity(reference: &str, candidate: &str) -> f64 {
    let size = reference.chars().count() as f64 + 1.0;
    let distance = levenshtein(reference, candidate) as f64;

    ((size - distance) / size).clamp(0.0, 1.0)
}

//! Similarity scores between two samples' state vectors.
//!
//! All functions share the [`SimilarityFn`] signature so solvers can take any
//! of them (or a caller-supplied one) as configuration. Scores are symmetric,
//! deterministic and finite; higher means more similar.

use crate::matrix::{State, UNMUTATED};
use crate::priors::{Weights, weight_of};

/// Signature shared by all similarity functions.
pub type SimilarityFn = fn(&[State], &[State], State, Option<&Weights>) -> f64;

/// Number (or total weight) of mutations shared by both samples.
///
/// Characters that are missing in either sample or unmutated in both are
/// skipped. With weights, each shared mutation contributes its weight instead
/// of 1.
pub fn hamming_similarity_without_missing(
    a: &[State],
    b: &[State],
    missing: State,
    weights: Option<&Weights>,
) -> f64 {
    a.iter()
        .zip(b)
        .enumerate()
        .filter(|(_, (x, y))| **x != missing && **y != missing && x == y && **x != UNMUTATED)
        .map(|(character, (&state, _))| match weights {
            Some(w) => weight_of(w, character, state),
            None => 1.0,
        })
        .sum()
}

/// [`hamming_similarity_without_missing`] divided by the number of characters
/// observed in both samples (0 when none is).
pub fn hamming_similarity_normalized_over_missing(
    a: &[State],
    b: &[State],
    missing: State,
    weights: Option<&Weights>,
) -> f64 {
    let present = a
        .iter()
        .zip(b)
        .filter(|(x, y)| **x != missing && **y != missing)
        .count();
    if present == 0 {
        return 0.0;
    }
    hamming_similarity_without_missing(a, b, missing, weights) / present as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_counts_shared_mutations() {
        let a = [1, 2, 0, -1, 3];
        let b = [1, 4, 0, 3, 3];
        assert_eq!(hamming_similarity_without_missing(&a, &b, -1, None), 2.0);
        assert_eq!(hamming_similarity_without_missing(&b, &a, -1, None), 2.0);
    }

    #[test]
    fn test_weighted() {
        let weights: Weights = BTreeMap::from([
            (0, BTreeMap::from([(1, 0.5)])),
            (2, BTreeMap::from([(7, 2.0)])),
        ]);
        let a = [1, 0, 7];
        let b = [1, 0, 7];
        assert_eq!(hamming_similarity_without_missing(&a, &b, -1, Some(&weights)), 2.5);
    }

    #[test]
    fn test_normalized_over_missing() {
        let a = [1, -1, 2, 0];
        let b = [1, 5, 3, 0];
        assert_eq!(hamming_similarity_normalized_over_missing(&a, &b, -1, None), 1.0 / 3.0);

        let all_missing = [-1, -1];
        assert_eq!(
            hamming_similarity_normalized_over_missing(&all_missing, &[1, 1], -1, None),
            0.0
        );
    }
}

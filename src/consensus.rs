//! Camin–Sokal consensus of sibling state vectors.
//!
//! Under irreversible mutation a parent can only carry a derived state if all
//! of its informative children carry it too. Missing values give no
//! information and are ignored; disagreement falls back to the unmutated state.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::matrix::{State, UNMUTATED};

/// Reconstruct the state vector of the lowest common ancestor of `vectors`.
///
/// Per character:
/// - all children agree (even on missing): keep that value;
/// - otherwise drop missing values; if exactly one value remains keep it;
/// - anything else: [`UNMUTATED`].
///
/// # Errors
/// [`Error::BadStateVectorLength`] if the vectors do not all have the length
/// of the first one.
pub fn lca_characters(vectors: &[&[State]], missing: State) -> Result<Vec<State>> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let k = first.len();
    if let Some(bad) = vectors.iter().find(|v| v.len() != k) {
        return Err(Error::BadStateVectorLength { expected: k, found: bad.len() });
    }

    let lca = (0..k)
        .map(|i| {
            let mut states: BTreeSet<State> = vectors.iter().map(|v| v[i]).collect();
            if states.len() > 1 {
                states.remove(&missing);
            }
            match (states.len(), states.first()) {
                (1, Some(&state)) => state,
                _ => UNMUTATED,
            }
        })
        .collect();

    Ok(lca)
}

//! Greedy split on the most frequent informative mutation.

use crate::frequencies::{MutationFrequencies, compute_mutation_frequencies};
use crate::matrix::{CharacterMatrix, State, UNMUTATED};
use crate::priors::{Weights, weight_of};

use super::{Partition, SolverConfig};

/// Pick the (character, state) pair to split on.
///
/// The score of a pair is its frequency, times its weight when weights are
/// given. States that are missing or unmutated are never chosen, nor are
/// states carried by every non-missing sample. Pairs are scanned in
/// ascending (character, state) order and only a strictly higher score
/// replaces the current best, so the first maximum wins.
///
/// Returns `None` when no pair scores above zero.
pub fn best_character_state(
    frequencies: &MutationFrequencies,
    n_samples: usize,
    missing: State,
    weights: Option<&Weights>,
) -> Option<(usize, State)> {
    let mut best = None;
    let mut best_score = 0.0;

    for (character, states) in frequencies.iter() {
        let observed = n_samples.saturating_sub(frequencies.missing(character));
        for (&state, &count) in states {
            if state == missing || state == UNMUTATED || count >= observed {
                continue;
            }
            let score = match weights {
                Some(w) => count as f64 * weight_of(w, character, state),
                None => count as f64,
            };
            if score > best_score {
                best_score = score;
                best = Some((character, state));
            }
        }
    }

    best
}

/// Divide `samples` on `(character, state)`.
///
/// Returns `(carriers, others, ambiguous)`: samples with the state, samples
/// with any other observed state, and samples missing the character.
pub fn divide_on_state(
    matrix: &CharacterMatrix,
    samples: &[usize],
    character: usize,
    state: State,
) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let mut carriers = Vec::new();
    let mut others = Vec::new();
    let mut ambiguous = Vec::new();

    for &sample in samples {
        match matrix.row(sample)[character] {
            s if s == state => carriers.push(sample),
            s if s == matrix.missing() => ambiguous.push(sample),
            _ => others.push(sample),
        }
    }

    (carriers, others, ambiguous)
}

/// Split on the best (character, state) pair; samples missing that
/// character are placed by the configured classifier.
pub fn greedy_split(
    matrix: &CharacterMatrix,
    samples: &[usize],
    weights: Option<&Weights>,
    config: &SolverConfig,
) -> Partition {
    let frequencies = compute_mutation_frequencies(matrix, samples);
    let Some((character, state)) =
        best_character_state(&frequencies, samples.len(), matrix.missing(), weights)
    else {
        return Partition::Polytomy(samples.to_vec());
    };

    log::trace!("greedy split on character {character} state {state}");
    let (left, right, ambiguous) = divide_on_state(matrix, samples, character, state);
    let (left, right) = (config.missing_classifier)(matrix, &left, &right, &ambiguous, weights);
    Partition::from_sides(left, right)
}

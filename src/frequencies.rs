//! Per-character tallies of observed states over a sample subset.

use std::collections::BTreeMap;

use crate::matrix::{CharacterMatrix, State};

/// Count of every observed state, per character.
///
/// The missing sentinel is always present as a key (possibly with count 0),
/// and states iterate in ascending order so callers that scan for a maximum
/// break ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFrequencies {
    missing: State,
    counts: Vec<BTreeMap<State, usize>>,
}

impl MutationFrequencies {
    pub fn n_characters(&self) -> usize {
        self.counts.len()
    }

    /// State counts of a single character.
    pub fn character(&self, character: usize) -> &BTreeMap<State, usize> {
        &self.counts[character]
    }

    /// Number of samples carrying `state` at `character`.
    pub fn count(&self, character: usize, state: State) -> usize {
        self.counts[character].get(&state).copied().unwrap_or(0)
    }

    /// Number of samples with the missing sentinel at `character`.
    pub fn missing(&self, character: usize) -> usize {
        self.count(character, self.missing)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeMap<State, usize>)> {
        self.counts.iter().enumerate()
    }
}

/// Tabulate state counts for every character across exactly `samples`.
///
/// Runs in O(|samples| × |characters|).
pub fn compute_mutation_frequencies(
    matrix: &CharacterMatrix,
    samples: &[usize],
) -> MutationFrequencies {
    let missing = matrix.missing();
    let mut counts: Vec<BTreeMap<State, usize>> = (0..matrix.n_characters())
        .map(|_| BTreeMap::from([(missing, 0)]))
        .collect();

    for &sample in samples {
        for (character, &state) in matrix.row(sample).iter().enumerate() {
            *counts[character].entry(state).or_insert(0) += 1;
        }
    }

    MutationFrequencies { missing, counts }
}

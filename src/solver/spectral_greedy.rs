//! Hybrid split: a greedy split on one mutation, refined on the similarity
//! graph.
//!
//! The greedy step proposes a biologically motivated cut (carriers of the
//! chosen mutation against everyone else); hill-climbing then moves
//! individual samples across it while that lowers the normalized cut.

use crate::frequencies::compute_mutation_frequencies;
use crate::graph::SimilarityGraph;
use crate::matrix::CharacterMatrix;
use crate::priors::Weights;

use super::greedy::{best_character_state, divide_on_state};
use super::spectral::complement;
use super::{Partition, SolverConfig};

pub fn spectral_greedy_split(
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

    let (left, right, ambiguous) = divide_on_state(matrix, samples, character, state);
    let (left, _) = (config.missing_classifier)(matrix, &left, &right, &ambiguous, weights);

    let graph = SimilarityGraph::build(matrix, samples, config.similarity, config.threshold, weights);
    let improved = graph.improve_cut(&left, config.max_hill_climb_moves);
    log::trace!(
        "hybrid split on character {character} state {state}: {} seeded, {} after refinement",
        left.len(),
        improved.len()
    );

    let right = complement(samples, &improved);
    Partition::from_sides(improved, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::greedy::greedy_split;

    #[test]
    fn test_identical_rows_give_polytomy() {
        let cm = CharacterMatrix::from_rows(vec![vec![2, 0, 1]; 3], -1).unwrap();
        let partition = spectral_greedy_split(&cm, &[0, 1, 2], None, &SolverConfig::default());
        assert_eq!(partition, Partition::Polytomy(vec![0, 1, 2]));
    }

    #[test]
    fn test_agrees_with_greedy_when_cut_is_clean() {
        let cm = CharacterMatrix::from_rows(
            vec![vec![1, 2, 0], vec![1, 2, 0], vec![0, 0, 3], vec![0, 0, 3]],
            -1,
        )
        .unwrap();
        let config = SolverConfig::default();
        let samples = [0, 1, 2, 3];

        assert_eq!(
            spectral_greedy_split(&cm, &samples, None, &config),
            greedy_split(&cm, &samples, None, &config)
        );
    }

    #[test]
    fn test_refinement_moves_outlier() {
        // Sample 2 carries the greedy mutation (character 0, state 1) but
        // otherwise looks like samples 3 and 4.
        let cm = CharacterMatrix::from_rows(
            vec![
                vec![1, 5, 5, 0, 0, 0],
                vec![1, 5, 5, 0, 0, 0],
                vec![1, 0, 0, 6, 6, 6],
                vec![0, 0, 0, 6, 6, 6],
                vec![0, 0, 0, 6, 6, 6],
            ],
            -1,
        )
        .unwrap();
        let samples = [0, 1, 2, 3, 4];
        let partition = spectral_greedy_split(&cm, &samples, None, &SolverConfig::default());

        assert_eq!(partition, Partition::Split { left: vec![0, 1], right: vec![2, 3, 4] });
    }
}

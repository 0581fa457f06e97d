//! Spectral split: normalized cut along the Fiedler vector.
//!
//! # Algorithm
//! 1. Build the similarity graph over the samples. No edge weight at all
//!    means no structure to separate, so the samples form a polytomy.
//! 2. Order samples by their Fiedler vector entry, ties by sample index.
//! 3. Sweep prefixes of that order, tracking the running cut weight
//!    (numerator) and prefix volume (denominator); keep the prefix with the
//!    lowest `numerator / min(denominator, total - denominator)`.
//! 4. Refine the best prefix by hill-climbing; the rest is the right side.

use std::collections::HashSet;

use crate::graph::SimilarityGraph;
use crate::matrix::CharacterMatrix;
use crate::priors::Weights;

use super::{Partition, SolverConfig};

pub fn spectral_split(
    matrix: &CharacterMatrix,
    samples: &[usize],
    weights: Option<&Weights>,
    config: &SolverConfig,
) -> Partition {
    let graph = SimilarityGraph::build(matrix, samples, config.similarity, config.threshold, weights);
    if graph.total_weight() == 0.0 {
        return Partition::Polytomy(samples.to_vec());
    }

    let fiedler = graph.fiedler_vector();
    let mut ordering: Vec<usize> = (0..graph.len()).collect();
    ordering.sort_by(|&a, &b| fiedler[a].total_cmp(&fiedler[b]).then(samples[a].cmp(&samples[b])));

    let best = best_prefix(&graph, &ordering);
    let seed: Vec<usize> = ordering[..=best].iter().map(|&v| samples[v]).collect();
    log::trace!("spectral sweep picked a prefix of {} samples", seed.len());

    let left = graph.improve_cut(&seed, config.max_hill_climb_moves);
    let right = complement(samples, &left);
    Partition::from_sides(left, right)
}

/// Index of the last vertex of the best prefix of `ordering`.
///
/// A run of zero numerators means the prefix has picked up samples with no
/// similarity to the other side; the sweep stops when the run ends and keeps
/// the prefix from just before that. A prefix whose smaller side has no volume
/// scores 0 and is taken as best.
pub(crate) fn best_prefix(graph: &SimilarityGraph, ordering: &[usize]) -> usize {
    let total = graph.total_weight();
    let mut in_cut = vec![false; graph.len()];
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut best_score = f64::INFINITY;
    let mut best_index = 0;

    for (i, &v) in ordering.iter().enumerate().take(ordering.len().saturating_sub(1)) {
        in_cut[v] = true;
        let neighbor_weight = graph.degree(v);
        let cut_edges: f64 = graph
            .neighbors(v)
            .iter()
            .filter(|&&(u, _)| in_cut[u])
            .map(|&(_, w)| w)
            .sum();

        denominator += neighbor_weight;
        let prev_numerator = if i > 0 { numerator } else { -1.0 };
        numerator += neighbor_weight - 2.0 * cut_edges;

        if numerator != 0.0 && prev_numerator == 0.0 {
            best_index = i - 1;
            break;
        }

        let smaller = f64::min(denominator, total - denominator);
        if smaller != 0.0 {
            let score = numerator / smaller;
            if score < best_score {
                best_score = score;
                best_index = i;
            }
        } else {
            best_score = 0.0;
            best_index = i;
        }
    }

    best_index
}

/// Samples of `all` that are not in `subset`, in `all`'s order.
pub(crate) fn complement(all: &[usize], subset: &[usize]) -> Vec<usize> {
    let subset: HashSet<usize> = subset.iter().copied().collect();
    all.iter().copied().filter(|s| !subset.contains(s)).collect()
}

//! Weighted similarity graph over a sample set, with the spectral machinery
//! used by the spectral and hybrid solvers.
//!
//! # Overview
//! Nodes are samples; an undirected edge joins two samples whose similarity
//! exceeds a threshold, weighted by that similarity. Pairs at or below the
//! threshold get no edge at all.
//!
//! # Normalized cut
//! For a left set `S` with volume `vol(S) = Σ degree(v), v ∈ S`:
//!
//! ```text
//! ncut(S) = cut(S, V \ S) / min(vol(S), vol(V) - vol(S))
//! ```
//!
//! Lower is better: little similarity crosses the cut relative to the
//! smaller side.

use std::collections::HashMap;

use nalgebra::{DMatrix, SymmetricEigen};
use rayon::prelude::*;

use crate::matrix::CharacterMatrix;
use crate::priors::Weights;
use crate::similarity::SimilarityFn;

/// Undirected weighted graph over a subset of samples.
///
/// Graph nodes are addressed by local index `0..len()`; [`samples`](Self::samples)
/// maps them back to matrix rows.
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    samples: Vec<usize>,
    /// Neighbour lists sorted by local index.
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl SimilarityGraph {
    /// Build the graph over `samples`.
    ///
    /// Pairwise similarities are computed in parallel; the resulting graph
    /// does not depend on scheduling.
    pub fn build(
        matrix: &CharacterMatrix,
        samples: &[usize],
        similarity: SimilarityFn,
        threshold: f64,
        weights: Option<&Weights>,
    ) -> Self {
        let n = samples.len();
        let missing = matrix.missing();

        let edges: Vec<(usize, usize, f64)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
            .filter_map(|(i, j)| {
                let s = similarity(matrix.row(samples[i]), matrix.row(samples[j]), missing, weights);
                (s > threshold).then_some((i, j, s))
            })
            .collect();

        Self::from_edges(samples.to_vec(), &edges)
    }

    /// Build a graph from explicit `(i, j, weight)` edges between local indices.
    pub fn from_edges(samples: Vec<usize>, edges: &[(usize, usize, f64)]) -> Self {
        let mut adjacency = vec![Vec::new(); samples.len()];
        for &(i, j, w) in edges {
            adjacency[i].push((j, w));
            adjacency[j].push((i, w));
        }
        for neighbours in adjacency.iter_mut() {
            neighbours.sort_by_key(|&(j, _)| j);
        }
        SimilarityGraph { samples, adjacency }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[usize] {
        &self.samples
    }

    pub fn neighbors(&self, v: usize) -> &[(usize, f64)] {
        &self.adjacency[v]
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Weighted degree of local node `v`.
    pub fn degree(&self, v: usize) -> f64 {
        self.adjacency[v].iter().map(|&(_, w)| w).sum()
    }

    /// Sum of all degrees, i.e. twice the total edge weight.
    pub fn total_weight(&self) -> f64 {
        (0..self.len()).map(|v| self.degree(v)).sum()
    }

    /// Total weight of edges with exactly one end in the left set.
    pub fn cut_weight(&self, in_left: &[bool]) -> f64 {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|&(v, _)| in_left[v])
            .flat_map(|(_, neighbours)| neighbours.iter())
            .filter(|&&(u, _)| !in_left[u])
            .map(|&(_, w)| w)
            .sum()
    }

    /// Sum of degrees over the left set.
    pub fn volume(&self, in_left: &[bool]) -> f64 {
        (0..self.len()).filter(|&v| in_left[v]).map(|v| self.degree(v)).sum()
    }

    /// `D^-1/2 (D - A) D^-1/2`; rows and columns of isolated nodes are zero.
    pub fn normalized_laplacian(&self) -> DMatrix<f64> {
        let n = self.len();
        let inv_sqrt: Vec<f64> = (0..n)
            .map(|v| {
                let d = self.degree(v);
                if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 }
            })
            .collect();

        let mut laplacian = DMatrix::zeros(n, n);
        for v in 0..n {
            laplacian[(v, v)] = self.degree(v) * inv_sqrt[v] * inv_sqrt[v];
            for &(u, w) in &self.adjacency[v] {
                laplacian[(v, u)] -= w * inv_sqrt[v] * inv_sqrt[u];
            }
        }
        laplacian
    }

    /// Eigenvector of the second-smallest eigenvalue of the normalized
    /// Laplacian.
    ///
    /// Eigenvalues are ordered ascending with ties broken by column index,
    /// and the vector's sign is fixed so its first non-negligible entry is
    /// positive. Graphs with fewer than two nodes yield all zeros.
    pub fn fiedler_vector(&self) -> Vec<f64> {
        let n = self.len();
        if n < 2 {
            return vec![0.0; n];
        }

        let eigen = SymmetricEigen::new(self.normalized_laplacian());
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[a]
                .total_cmp(&eigen.eigenvalues[b])
                .then(a.cmp(&b))
        });

        let mut fiedler: Vec<f64> = eigen.eigenvectors.column(order[1]).iter().copied().collect();
        if fiedler.iter().find(|x| x.abs() > 1e-12).is_some_and(|&x| x < 0.0) {
            fiedler.iter_mut().for_each(|x| *x = -*x);
        }
        fiedler
    }

    /// Hill-climb a cut by moving single samples across it.
    ///
    /// Starting from `left` (sample ids), repeatedly applies the move with the
    /// lowest resulting normalized cut as long as it strictly improves the
    /// current score. Neither side is ever emptied. Stops when no move
    /// improves or after `max_moves` moves. A cut that already has zero
    /// crossing weight is returned unchanged.
    ///
    /// Returns the improved left set in graph node order.
    pub fn improve_cut(&self, left: &[usize], max_moves: Option<usize>) -> Vec<usize> {
        let n = self.len();
        let position: HashMap<usize, usize> =
            self.samples.iter().enumerate().map(|(i, &s)| (s, i)).collect();

        let mut in_left = vec![false; n];
        for s in left {
            if let Some(&v) = position.get(s) {
                in_left[v] = true;
            }
        }

        let total = self.total_weight();
        let degrees: Vec<f64> = (0..n).map(|v| self.degree(v)).collect();
        let mut cut = self.cut_weight(&in_left);
        let mut volume = self.volume(&in_left);
        let mut left_size = in_left.iter().filter(|&&x| x).count();
        let mut moves = 0;

        while cut != 0.0 && max_moves.is_none_or(|m| moves < m) {
            let current = ncut_ratio(cut, volume, total).unwrap_or(f64::INFINITY);

            let mut best: Option<(usize, f64)> = None;
            for v in 0..n {
                let emptied = if in_left[v] { left_size == 1 } else { left_size + 1 == n };
                if emptied {
                    continue;
                }

                let (to_left, to_right) = self.adjacency[v].iter().fold((0.0, 0.0), |(l, r), &(u, w)| {
                    if in_left[u] { (l + w, r) } else { (l, r + w) }
                });
                let (new_cut, new_volume) = if in_left[v] {
                    (cut + to_left - to_right, volume - degrees[v])
                } else {
                    (cut + to_right - to_left, volume + degrees[v])
                };

                let Some(ratio) = ncut_ratio(new_cut, new_volume, total) else { continue };
                if best.is_none_or(|(_, r)| ratio < r) {
                    best = Some((v, ratio));
                }
            }

            match best {
                Some((v, ratio)) if ratio < current => {
                    if in_left[v] {
                        left_size -= 1;
                    } else {
                        left_size += 1;
                    }
                    in_left[v] = !in_left[v];
                    // Recomputed rather than updated incrementally so the score
                    // is a pure function of the partition.
                    cut = self.cut_weight(&in_left);
                    volume = self.volume(&in_left);
                    moves += 1;
                }
                _ => break,
            }
        }

        log::trace!("improve_cut: {moves} moves, final cut weight {cut}");
        (0..n).filter(|&v| in_left[v]).map(|v| self.samples[v]).collect()
    }
}

/// Normalized cut of a partition, or `None` when the smaller side has no volume.
pub fn ncut_ratio(cut: f64, volume: f64, total: f64) -> Option<f64> {
    let denominator = volume.min(total - volume);
    (denominator > 0.0).then(|| cut / denominator)
}

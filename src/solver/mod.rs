//! Top-down tree reconstruction by recursive sample splitting.
//!
//! # Algorithm
//! One shared recursive builder drives every strategy:
//!
//! 1. Collapse identical rows; only representatives are solved.
//! 2. `solve(samples)`: a single sample is a leaf. Otherwise a fresh internal
//!    node is allocated and the [`SplitStrategy`] partitions the samples.
//!    A [`Partition::Polytomy`] hangs every sample directly below the node;
//!    a [`Partition::Split`] recurses into both sides.
//! 3. Internal edges along which no mutation happens are contracted.
//! 4. Every duplicate row is reattached next to its representative.
//!
//! Sample `i` of the matrix becomes node `i`; internal nodes get ids from an
//! [`IdAllocator`] starting at the number of samples.
//!
//! # Example
//! ```
//! use lineage_solver::{CharacterMatrix, LineageTree, Solver, SplitStrategy};
//!
//! let matrix = CharacterMatrix::from_rows(
//!     vec![vec![1, 0], vec![1, 0], vec![0, 1], vec![0, 1]],
//!     -1,
//! )
//! .unwrap();
//! let mut tree = LineageTree::new(matrix);
//! Solver::new(SplitStrategy::Greedy).solve(&mut tree).unwrap();
//! assert_eq!(tree.leaves().unwrap().len(), 4);
//! ```

pub mod greedy;
pub mod postprocess;
pub mod spectral;
pub mod spectral_greedy;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::matrix::CharacterMatrix;
use crate::missing::{MissingDataClassifier, assign_missing_average};
use crate::priors::{PriorTransformation, Priors, Weights, transform_priors};
use crate::similarity::{SimilarityFn, hamming_similarity_without_missing};
use crate::tree::{LineageTree, Network, NodeId};

/// Branch length given to every edge the solvers emit.
const UNIT_LENGTH: f64 = 1.0;

/// Outcome of splitting a sample set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// Two non-empty sides.
    Split { left: Vec<usize>, right: Vec<usize> },
    /// No informative split exists; all samples hang from one node.
    Polytomy(Vec<usize>),
}

impl Partition {
    /// Build a partition, treating an empty side as a polytomy of the other.
    pub fn from_sides(left: Vec<usize>, right: Vec<usize>) -> Self {
        if left.is_empty() {
            Partition::Polytomy(right)
        } else if right.is_empty() {
            Partition::Polytomy(left)
        } else {
            Partition::Split { left, right }
        }
    }
}

/// How a sample set is divided at each step of the recursion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Split on the most frequent (weighted) mutation.
    #[default]
    Greedy,
    /// Normalized cut of the similarity graph along its Fiedler vector.
    Spectral,
    /// Greedy split refined by hill-climbing on the similarity graph.
    SpectralGreedy,
}

impl SplitStrategy {
    /// Partition `samples`.
    ///
    /// Every strategy returns each input sample exactly once, and a
    /// [`Partition::Split`] has both sides strictly smaller than the input.
    pub fn perform_split(
        self,
        matrix: &CharacterMatrix,
        samples: &[usize],
        weights: Option<&Weights>,
        config: &SolverConfig,
    ) -> Partition {
        match self {
            SplitStrategy::Greedy => greedy::greedy_split(matrix, samples, weights, config),
            SplitStrategy::Spectral => spectral::spectral_split(matrix, samples, weights, config),
            SplitStrategy::SpectralGreedy => {
                spectral_greedy::spectral_greedy_split(matrix, samples, weights, config)
            }
        }
    }
}

/// Tunable pieces shared by all strategies.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Pairs with similarity at or below this get no graph edge.
    pub threshold: f64,
    pub similarity: SimilarityFn,
    pub missing_classifier: MissingDataClassifier,
    pub priors: Option<Priors>,
    pub prior_transformation: PriorTransformation,
    /// Cap on improving moves per hill-climb; unbounded when `None`.
    pub max_hill_climb_moves: Option<usize>,
    /// Solve both sides of a split concurrently.
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            threshold: 0.0,
            similarity: hamming_similarity_without_missing,
            missing_classifier: assign_missing_average,
            priors: None,
            prior_transformation: PriorTransformation::default(),
            max_hill_climb_moves: None,
            parallel: false,
        }
    }
}

impl SolverConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityFn) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_missing_classifier(mut self, classifier: MissingDataClassifier) -> Self {
        self.missing_classifier = classifier;
        self
    }

    pub fn with_priors(mut self, priors: Priors, transformation: PriorTransformation) -> Self {
        self.priors = Some(priors);
        self.prior_transformation = transformation;
        self
    }

    pub fn with_max_hill_climb_moves(mut self, moves: usize) -> Self {
        self.max_hill_climb_moves = Some(moves);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Weights derived from the priors, if any were given.
    pub fn weights(&self) -> Option<Weights> {
        self.priors
            .as_ref()
            .map(|p| transform_priors(p, self.prior_transformation))
    }
}

/// Hands out internal node ids. Ids are never reused, including across the
/// two concurrently solved halves of a split.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicUsize,
}

impl IdAllocator {
    pub fn starting_at(first: NodeId) -> Self {
        IdAllocator { next: AtomicUsize::new(first) }
    }

    pub fn next_id(&self) -> NodeId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// A solved subtree: its root and its edges in preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    pub root: NodeId,
    pub edges: Vec<(NodeId, NodeId)>,
}

/// Recursive tree builder parameterised by a split strategy.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    strategy: SplitStrategy,
    config: SolverConfig,
}

impl Solver {
    pub fn new(strategy: SplitStrategy) -> Self {
        Solver { strategy, config: SolverConfig::default() }
    }

    pub fn with_config(strategy: SplitStrategy, config: SolverConfig) -> Self {
        Solver { strategy, config }
    }

    pub fn strategy(&self) -> SplitStrategy {
        self.strategy
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Reconstruct a tree for the tree's character matrix and load it.
    ///
    /// Leaves are labelled with sample names and internal nodes with their
    /// id. Every edge has unit length.
    ///
    /// # Errors
    /// [`Error::EmptySampleSet`] if the matrix has no samples.
    pub fn solve(&self, tree: &mut LineageTree) -> Result<()> {
        let network = {
            let matrix = tree.character_matrix();
            if matrix.n_samples() == 0 {
                return Err(Error::EmptySampleSet);
            }

            let dedup = matrix.deduplicate();
            log::info!(
                "solving {} samples ({} unique) with {:?}",
                matrix.n_samples(),
                dedup.representatives.len(),
                self.strategy
            );

            let weights = self.config.weights();
            let allocator = IdAllocator::starting_at(matrix.n_samples());
            let subtree = self.solve_samples(matrix, &dedup.representatives, weights.as_ref(), &allocator)?;

            let mut network = assemble(matrix, &subtree)?;
            postprocess::collapse_mutationless_edges(&mut network, matrix)?;
            postprocess::attach_duplicates(&mut network, &dedup, matrix, &allocator)?;
            network
        };

        let n_nodes = network.len();
        tree.populate(network)?;
        log::info!("reconstructed tree with {n_nodes} nodes");
        Ok(())
    }

    /// Recursively build the subtree over `samples`.
    ///
    /// # Errors
    /// - [`Error::EmptySampleSet`] if `samples` is empty;
    /// - [`Error::Matrix`] if a sample index is not a row of `matrix`.
    pub fn solve_samples(
        &self,
        matrix: &CharacterMatrix,
        samples: &[usize],
        weights: Option<&Weights>,
        allocator: &IdAllocator,
    ) -> Result<Subtree> {
        if let Some(&sample) = samples.iter().find(|&&s| s >= matrix.n_samples()) {
            return Err(Error::Matrix(format!(
                "sample {sample} is out of range for {} samples",
                matrix.n_samples()
            )));
        }
        self.solve_subset(matrix, samples, weights, allocator)
    }

    fn solve_subset(
        &self,
        matrix: &CharacterMatrix,
        samples: &[usize],
        weights: Option<&Weights>,
        allocator: &IdAllocator,
    ) -> Result<Subtree> {
        let node = match samples {
            [] => return Err(Error::EmptySampleSet),
            [leaf] => return Ok(Subtree { root: *leaf, edges: Vec::new() }),
            _ => allocator.next_id(),
        };

        match self.strategy.perform_split(matrix, samples, weights, &self.config) {
            Partition::Polytomy(members) => {
                log::debug!("node {node}: polytomy over {} samples", members.len());
                Ok(Subtree {
                    root: node,
                    edges: members.into_iter().map(|s| (node, s)).collect(),
                })
            }
            Partition::Split { left, right } => {
                log::debug!("node {node}: split {} | {}", left.len(), right.len());
                let (l, r) = if self.config.parallel {
                    rayon::join(
                        || self.solve_subset(matrix, &left, weights, allocator),
                        || self.solve_subset(matrix, &right, weights, allocator),
                    )
                } else {
                    (
                        self.solve_subset(matrix, &left, weights, allocator),
                        self.solve_subset(matrix, &right, weights, allocator),
                    )
                };
                let (l, r) = (l?, r?);

                let mut edges = Vec::with_capacity(l.edges.len() + r.edges.len() + 2);
                edges.push((node, l.root));
                edges.extend(l.edges);
                edges.push((node, r.root));
                edges.extend(r.edges);
                Ok(Subtree { root: node, edges })
            }
        }
    }
}

/// Turn a solved subtree into a labelled network with unit branch lengths.
fn assemble(matrix: &CharacterMatrix, subtree: &Subtree) -> Result<Network> {
    let mut network = Network::new();
    network.add_node(subtree.root, node_label(matrix, subtree.root));
    for &(parent, child) in &subtree.edges {
        if !network.contains(child) {
            network.add_node(child, node_label(matrix, child));
        }
        network.add_edge(parent, child, UNIT_LENGTH)?;
    }
    Ok(network)
}

/// Sample name for leaves; the id for internal nodes, prefixed when the bare
/// id would clash with a sample name.
pub(crate) fn node_label(matrix: &CharacterMatrix, id: NodeId) -> String {
    if id < matrix.n_samples() {
        return matrix.name(id).to_string();
    }
    let label = id.to_string();
    if matrix.index_of(&label).is_some() { format!("node{id}") } else { label }
}

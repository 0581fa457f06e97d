//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `matrix`: character matrix of samples × characters, deduplication.
//! - `frequencies`: per-character state counts over a sample subset.
//! - `consensus`: ancestral state inference from child state vectors.
//! - `tree`: rooted lineage tree with ages, branch lengths and states.
//! - `newick`: Newick import/export of lineage trees.
//! - `similarity`: similarity scores between state vectors.
//! - `priors`: mutation priors and derived weights.
//! - `missing`: placement of samples missing the split character.
//! - `graph`: similarity graph, Fiedler vector and cut refinement.
//! - `solver`: recursive greedy / spectral / hybrid reconstruction.
//! - `io`: reading character matrices and writing trees.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod consensus;
pub mod error;
pub mod frequencies;
pub mod graph;
pub mod io;
pub mod matrix;
pub mod missing;
pub mod newick;
pub mod priors;
pub mod similarity;
pub mod solver;
pub mod tree;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use error::{Error, Result};
pub use matrix::{CharacterMatrix, State};
pub use solver::{Partition, Solver, SolverConfig, SplitStrategy};
pub use tree::{LineageTree, NodeId, TraversalOrder};

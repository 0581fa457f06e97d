//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result`]. Engines never recover locally:
//! the algorithms are deterministic over in-memory data, so an error always
//! reaches the caller unchanged.

use phylotree::tree::TreeError;
use thiserror::Error;

use crate::tree::NodeId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("tree is not initialized")]
    UninitializedTree,

    #[error("edge ({parent}, {child}) does not exist")]
    EdgeNotFound { parent: NodeId, child: NodeId },

    #[error("branch length must be non-negative, got {length}")]
    InvalidLength { length: f64 },

    #[error("age {age} is less than the age of the parent ({parent_age})")]
    InvalidAge { age: f64, parent_age: f64 },

    #[error("character vector has length {found}, expected {expected}")]
    BadStateVectorLength { expected: usize, found: usize },

    #[error("cannot solve an empty sample set")]
    EmptySampleSet,

    #[error("label '{0}' would be assigned to more than one node")]
    AmbiguousLabel(String),

    #[error("node {0} is not in the tree")]
    NodeNotFound(NodeId),

    #[error("no node is labelled '{0}'")]
    UnknownLabel(String),

    #[error("node {0} is the root and has no parent")]
    RootHasNoParent(NodeId),

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("invalid character matrix: {0}")]
    Matrix(String),

    #[error("failed to parse newick: {0}")]
    Newick(String),

    #[error(transparent)]
    Phylo(#[from] TreeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

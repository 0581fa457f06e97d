//! Python binding layer for lineage reconstruction.
//!
//! Exposes the solvers to Python, taking the character matrix as plain lists
//! and returning the reconstructed tree as Newick.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::matrix::CharacterMatrix;
use crate::solver::{Solver, SolverConfig, SplitStrategy};
use crate::tree::LineageTree;

/// Reconstruct a lineage tree and return it as a Newick string.
///
/// Args:
///     names: Sample names, one per row
///     rows: Character states per sample (all rows the same length)
///     solver: "greedy", "spectral" or "spectral_greedy" (default: "greedy")
///     missing: Integer marking missing states (default: -1)
///     threshold: Similarity threshold for the similarity graph (default: 0.0)
///
/// Returns:
///     The tree in Newick format, leaves labelled with sample names
///
/// Raises:
///     ValueError: If the matrix is malformed, the solver name is unknown or
///     reconstruction fails
#[pyfunction]
#[pyo3(signature = (names, rows, solver="greedy", missing=-1, threshold=0.0))]
fn solve_newick(
    names: Vec<String>,
    rows: Vec<Vec<i32>>,
    solver: &str,
    missing: i32,
    threshold: f64,
) -> PyResult<String> {
    let strategy = parse_strategy(solver)?;
    let matrix = CharacterMatrix::new(names, rows, missing)
        .map_err(|e| PyValueError::new_err(format!("Invalid character matrix: {}", e)))?;

    let config = SolverConfig::default().with_threshold(threshold);
    let mut tree = LineageTree::new(matrix);
    Solver::with_config(strategy, config)
        .solve(&mut tree)
        .and_then(|_| tree.to_newick())
        .map_err(|e| PyValueError::new_err(format!("Failed to reconstruct tree: {}", e)))
}

fn parse_strategy(name: &str) -> PyResult<SplitStrategy> {
    match name.to_ascii_lowercase().replace('-', "_").as_str() {
        "greedy" => Ok(SplitStrategy::Greedy),
        "spectral" => Ok(SplitStrategy::Spectral),
        "spectral_greedy" => Ok(SplitStrategy::SpectralGreedy),
        other => Err(PyValueError::new_err(format!(
            "Unknown solver '{}', expected greedy, spectral or spectral_greedy",
            other
        ))),
    }
}

/// Python module definition
#[pymodule]
fn lineage_solver(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(solve_newick, m)?)?;
    Ok(())
}

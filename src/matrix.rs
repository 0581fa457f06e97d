//! Character matrix: observed heritable marks per sample.
//!
//! Rows are samples, columns are characters (marker sites). A distinguished
//! sentinel marks unobserved (sample, character) pairs and state `0` is the
//! unmutated baseline.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// A discrete character state.
pub type State = i32;

/// The unmutated (root) state of every character.
pub const UNMUTATED: State = 0;

/// Default sentinel for unobserved states.
pub const DEFAULT_MISSING: State = -1;

/// Immutable matrix of character states with unique sample names.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterMatrix {
    names: Vec<String>,
    rows: Vec<Vec<State>>,
    missing: State,
    n_characters: usize,
    index: HashMap<String, usize>,
}

/// Result of collapsing identical rows.
///
/// The first occurrence of a state vector is its representative; every later
/// identical row is recorded as one of its duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplication {
    pub representatives: Vec<usize>,
    pub duplicates: BTreeMap<usize, Vec<usize>>,
}

impl CharacterMatrix {
    /// Build a matrix from named rows.
    ///
    /// # Errors
    /// Returns [`Error::Matrix`] when names and rows disagree in length, when
    /// rows are ragged, or when a sample name repeats.
    pub fn new(names: Vec<String>, rows: Vec<Vec<State>>, missing: State) -> Result<Self> {
        if names.len() != rows.len() {
            return Err(Error::Matrix(format!(
                "{} sample names for {} rows",
                names.len(),
                rows.len()
            )));
        }

        let n_characters = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_characters) {
            return Err(Error::Matrix(format!(
                "row {i} has {} characters, expected {n_characters}",
                row.len()
            )));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::Matrix(format!("sample name '{name}' is not unique")));
            }
        }

        Ok(CharacterMatrix { names, rows, missing, n_characters, index })
    }

    /// Build a matrix whose sample names are the row indices.
    pub fn from_rows(rows: Vec<Vec<State>>, missing: State) -> Result<Self> {
        let names = (0..rows.len()).map(|i| i.to_string()).collect();
        Self::new(names, rows, missing)
    }

    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn n_characters(&self) -> usize {
        self.n_characters
    }

    pub fn missing(&self) -> State {
        self.missing
    }

    pub fn row(&self, sample: usize) -> &[State] {
        &self.rows[sample]
    }

    pub fn name(&self, sample: usize) -> &str {
        &self.names[sample]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Collapse identical rows, keeping row order of first occurrences.
    pub fn deduplicate(&self) -> Deduplication {
        let mut seen: HashMap<&[State], usize> = HashMap::with_capacity(self.rows.len());
        let mut dedup = Deduplication::default();

        for (i, row) in self.rows.iter().enumerate() {
            match seen.get(row.as_slice()) {
                Some(&rep) => dedup.duplicates.entry(rep).or_default().push(i),
                None => {
                    seen.insert(row.as_slice(), i);
                    dedup.representatives.push(i);
                }
            }
        }

        dedup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_rows() {
        let err = CharacterMatrix::from_rows(vec![vec![1, 0], vec![1]], -1).unwrap_err();
        assert!(matches!(err, Error::Matrix(_)));
    }

    #[test]
    fn test_rejects_repeated_names() {
        let names = vec!["a".to_string(), "a".to_string()];
        let err = CharacterMatrix::new(names, vec![vec![0], vec![1]], -1).unwrap_err();
        assert!(matches!(err, Error::Matrix(_)));
    }

    #[test]
    fn test_deduplicate_groups_identical_rows() {
        let cm = CharacterMatrix::from_rows(
            vec![vec![1, 0], vec![0, 1], vec![1, 0], vec![1, 0], vec![2, 2]],
            -1,
        )
        .unwrap();
        let dedup = cm.deduplicate();

        assert_eq!(dedup.representatives, vec![0, 1, 4]);
        assert_eq!(dedup.duplicates.get(&0), Some(&vec![2, 3]));
        assert_eq!(dedup.duplicates.len(), 1);
    }

    #[test]
    fn test_lookup_by_name() {
        let cm = CharacterMatrix::from_rows(vec![vec![0], vec![1]], -1).unwrap();
        assert_eq!(cm.index_of("1"), Some(1));
        assert_eq!(cm.name(0), "0");
        assert_eq!(cm.n_characters(), 1);
        assert_eq!(cm.index_of("x"), None);
    }
}

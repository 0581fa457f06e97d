//! Assignment of samples whose state is missing on the split character.

use crate::matrix::CharacterMatrix;
use crate::priors::Weights;
use crate::similarity::hamming_similarity_without_missing;

/// Redistributes ambiguous samples between the two sides of a split.
///
/// Contract: every input sample appears in exactly one output list, and the
/// original members of each side stay on that side.
pub type MissingDataClassifier =
    fn(&CharacterMatrix, &[usize], &[usize], &[usize], Option<&Weights>) -> (Vec<usize>, Vec<usize>);

/// Put each ambiguous sample on the side it is, on average, most similar to.
///
/// Averages are taken over the original members of each side, so the order
/// in which ambiguous samples are processed does not matter. Ties go right.
pub fn assign_missing_average(
    matrix: &CharacterMatrix,
    left: &[usize],
    right: &[usize],
    ambiguous: &[usize],
    weights: Option<&Weights>,
) -> (Vec<usize>, Vec<usize>) {
    let missing = matrix.missing();
    let mean_similarity = |sample: usize, side: &[usize]| {
        if side.is_empty() {
            return 0.0;
        }
        let total: f64 = side
            .iter()
            .map(|&other| {
                hamming_similarity_without_missing(matrix.row(sample), matrix.row(other), missing, weights)
            })
            .sum();
        total / side.len() as f64
    };

    let mut new_left = left.to_vec();
    let mut new_right = right.to_vec();
    for &sample in ambiguous {
        if mean_similarity(sample, left) > mean_similarity(sample, right) {
            new_left.push(sample);
        } else {
            new_right.push(sample);
        }
    }

    (new_left, new_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_samples_follow_similarity() {
        let cm = CharacterMatrix::from_rows(
            vec![
                vec![1, 2, 0],
                vec![1, 2, 3],
                vec![0, 4, 5],
                vec![-1, 2, 0],
                vec![-1, 4, 5],
                vec![-1, 0, 0],
            ],
            -1,
        )
        .unwrap();

        let (left, right) = assign_missing_average(&cm, &[0, 1], &[2], &[3, 4, 5], None);
        assert_eq!(left, vec![0, 1, 3]);
        assert_eq!(right, vec![2, 4, 5]);
    }

    #[test]
    fn test_partition_refinement() {
        let cm = CharacterMatrix::from_rows(vec![vec![1], vec![0], vec![-1], vec![-1]], -1).unwrap();
        let (left, right) = assign_missing_average(&cm, &[0], &[1], &[2, 3], None);

        assert!(left.contains(&0));
        assert!(right.contains(&1));
        let mut all: Vec<usize> = left.iter().chain(&right).copied().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }
}

//! Mutation priors and the weights derived from them.
//!
//! Priors give, per character, the probability of mutating from the
//! unmutated state to each derived state. Rare mutations are more informative,
//! so weights are a decreasing transformation of those probabilities.

use std::collections::BTreeMap;

use crate::matrix::State;

/// Per-character, per-state prior probabilities.
pub type Priors = BTreeMap<usize, BTreeMap<State, f64>>;

/// Per-character, per-state weights.
pub type Weights = BTreeMap<usize, BTreeMap<State, f64>>;

/// How a prior probability `p` becomes a weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorTransformation {
    /// `-ln(p)`
    #[default]
    NegativeLog,
    /// `1 / p`
    Inverse,
    /// `sqrt(1 / p)`
    SquareRootInverse,
}

impl PriorTransformation {
    pub fn apply(self, p: f64) -> f64 {
        match self {
            PriorTransformation::NegativeLog => -p.ln(),
            PriorTransformation::Inverse => 1.0 / p,
            PriorTransformation::SquareRootInverse => (1.0 / p).sqrt(),
        }
    }
}

/// Transform every prior into a weight.
pub fn transform_priors(priors: &Priors, transformation: PriorTransformation) -> Weights {
    priors
        .iter()
        .map(|(&character, states)| {
            let weights = states
                .iter()
                .map(|(&state, &p)| (state, transformation.apply(p)))
                .collect();
            (character, weights)
        })
        .collect()
}

/// Weight of a (character, state) pair; pairs without a weight count as 1.
pub fn weight_of(weights: &Weights, character: usize, state: State) -> f64 {
    match weights.get(&character).and_then(|s| s.get(&state)) {
        Some(&w) => w,
        None => {
            log::warn!("no weight for character {character} state {state}, using 1");
            1.0
        }
    }
}

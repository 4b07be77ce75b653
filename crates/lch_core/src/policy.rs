//! Decision policies: pick one candidate action per activation.
//!
//! The engine only needs [`DecisionPolicy::select`]. The policies here let
//! games run headless; a learned evaluator plugs in through the same trait.
//!
//! ```
//! use lch_core::policy::{DecisionPolicy, FirstChoicePolicy};
//!
//! let mut policy = FirstChoicePolicy;
//! assert_eq!(policy.name(), "first");
//! ```

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::action::{Action, FEATURE_COUNT};

/// Chooses among legal actions.
///
/// `select` is only called with a non-empty slice and must return an index
/// into it. The turn loop rejects anything else with
/// [`GameError::InvalidPolicyChoice`](crate::error::GameError::InvalidPolicyChoice).
pub trait DecisionPolicy: Send {
    /// Index of the chosen action.
    fn select(&mut self, candidates: &[Action]) -> usize;

    /// The opposing team just resolved `action`. Stateless policies ignore it.
    fn observe_opponent_action(&mut self, _action: &Action) {}

    /// Short name for logs and results.
    fn name(&self) -> &str;
}

/// Always takes the first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstChoicePolicy;

impl DecisionPolicy for FirstChoicePolicy {
    fn select(&mut self, _candidates: &[Action]) -> usize {
        0
    }

    fn name(&self) -> &str {
        "first"
    }
}

/// Uniformly random choice from a seeded generator.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    /// Create with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl DecisionPolicy for RandomPolicy {
    fn select(&mut self, candidates: &[Action]) -> usize {
        self.rng.gen_range(0..candidates.len().max(1))
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Linear weights over [`Action::feature_vector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    /// One weight per feature, in feature-vector order.
    pub weights: [f64; FEATURE_COUNT],
    /// Constant term.
    #[serde(default)]
    pub bias: f64,
}

impl Default for FeatureWeights {
    /// Aggressive but cautious: favours likely, damaging, finishing attacks
    /// and squares with targets, avoids squares the enemy can punish.
    fn default() -> Self {
        Self {
            weights: [0.0, 0.4, 0.3, -0.4, -0.3, 1.0, 0.8, -0.2],
            bias: 0.0,
        }
    }
}

impl FeatureWeights {
    /// Score for one candidate.
    #[must_use]
    pub fn score(&self, action: &Action, candidates: usize) -> f64 {
        let inputs = action.feature_vector(candidates);
        self.bias
            + self
                .weights
                .iter()
                .zip(inputs.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// Scores every candidate and picks among the best `top_n` at random.
///
/// With `top_n == 1` this is a plain argmax; ties go to the earlier
/// candidate.
#[derive(Debug, Clone)]
pub struct WeightedPolicy {
    weights: FeatureWeights,
    top_n: usize,
    rng: ChaCha8Rng,
}

impl WeightedPolicy {
    /// Create a scorer; a `top_n` of zero is treated as one.
    #[must_use]
    pub fn new(weights: FeatureWeights, top_n: usize, seed: u64) -> Self {
        Self {
            weights,
            top_n: top_n.max(1),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The weights in use.
    #[must_use]
    pub const fn weights(&self) -> &FeatureWeights {
        &self.weights
    }

    /// Candidate indices, best first.
    #[must_use]
    pub fn ranked(&self, candidates: &[Action]) -> Vec<usize> {
        let scores: Vec<f64> = candidates
            .iter()
            .map(|a| self.weights.score(a, candidates.len()))
            .collect();
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        // Stable sort keeps earlier candidates ahead on equal scores
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order
    }
}

impl DecisionPolicy for WeightedPolicy {
    fn select(&mut self, candidates: &[Action]) -> usize {
        let ranked = self.ranked(candidates);
        let best = &ranked[..self.top_n.min(ranked.len())];
        best.choose(&mut self.rng).copied().unwrap_or(0)
    }

    fn name(&self) -> &str {
        "weighted"
    }
}

/// Serializable description of a policy, for scenario files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum PolicySpec {
    /// [`FirstChoicePolicy`].
    #[default]
    First,
    /// [`RandomPolicy`].
    Random {
        /// Base seed, offset by the game seed.
        seed: u64,
    },
    /// [`WeightedPolicy`].
    Weighted {
        /// Scoring weights.
        #[serde(default)]
        weights: FeatureWeights,
        /// How many top candidates to sample from.
        top_n: usize,
        /// Base seed, offset by the game seed.
        seed: u64,
    },
}

impl PolicySpec {
    /// Instantiate for one game. Seeded policies mix in `game_seed` so that
    /// every game of a batch plays differently.
    #[must_use]
    pub fn build(&self, game_seed: u64) -> Box<dyn DecisionPolicy> {
        match self {
            Self::First => Box::new(FirstChoicePolicy),
            Self::Random { seed } => Box::new(RandomPolicy::new(seed.wrapping_add(game_seed))),
            Self::Weighted {
                weights,
                top_n,
                seed,
            } => Box::new(WeightedPolicy::new(
                *weights,
                *top_n,
                seed.wrapping_add(game_seed),
            )),
        }
    }
}

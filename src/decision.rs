use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::types::{Competitor, CompetitorIndex, Match};

/// Supplies the winner of a pending match. The engine stays the same whether
/// results come from a simulation or from a person picking images.
pub trait DecisionSource {
    fn decide(&mut self, pending: &Match, competitors: &[Competitor]) -> CompetitorIndex;
}

impl<F> DecisionSource for F
where
    F: FnMut(&Match, &[Competitor]) -> CompetitorIndex,
{
    fn decide(&mut self, pending: &Match, competitors: &[Competitor]) -> CompetitorIndex {
        self(pending, competitors)
    }
}

/// Fair coin per match.
pub struct RandomDecision {
    rng: StdRng,
}

impl RandomDecision {
    pub fn new(seed: u64) -> Self {
        RandomDecision {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DecisionSource for RandomDecision {
    fn decide(&mut self, pending: &Match, _competitors: &[Competitor]) -> CompetitorIndex {
        if self.rng.gen_bool(0.5) {
            pending.first
        } else {
            pending.second
        }
    }
}

/// Favours lower indices with weight `1 / (index + 1)`, like seeding does in a bracket.
pub struct WeightedDecision {
    rng: StdRng,
}

impl WeightedDecision {
    pub fn new(seed: u64) -> Self {
        WeightedDecision {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DecisionSource for WeightedDecision {
    fn decide(&mut self, pending: &Match, _competitors: &[Competitor]) -> CompetitorIndex {
        let weight_a = 1.0 / (pending.first as f64 + 1.0);
        let weight_b = 1.0 / (pending.second as f64 + 1.0);
        let roll = self.rng.gen::<f64>() * (weight_a + weight_b);
        if roll < weight_a {
            pending.first
        } else {
            pending.second
        }
    }
}

/// Which built-in source a collection run uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionKind {
    #[default]
    Random,
    Weighted,
}

impl DecisionKind {
    pub fn source(self, seed: u64) -> SeededDecision {
        match self {
            DecisionKind::Random => SeededDecision::Random(RandomDecision::new(seed)),
            DecisionKind::Weighted => SeededDecision::Weighted(WeightedDecision::new(seed)),
        }
    }
}

impl FromStr for DecisionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(DecisionKind::Random),
            "weighted" => Ok(DecisionKind::Weighted),
            other => Err(ConfigError::UnknownDecision(other.to_string())),
        }
    }
}

/// A built-in source chosen at runtime.
pub enum SeededDecision {
    Random(RandomDecision),
    Weighted(WeightedDecision),
}

impl DecisionSource for SeededDecision {
    fn decide(&mut self, pending: &Match, competitors: &[Competitor]) -> CompetitorIndex {
        match self {
            SeededDecision::Random(source) => source.decide(pending, competitors),
            SeededDecision::Weighted(source) => source.decide(pending, competitors),
        }
    }
}

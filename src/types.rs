use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use crate::engine::TournamentEngine;

// ── Constants ──────────────────────────────────────────────────────────

/// Score given to the first padding entry; each further entry sits one lower.
pub const SYNTHETIC_SCORE_BASE: i64 = -500;
pub const SYNTHETIC_LABEL_PREFIX: &str = "__bye_";
pub const MIN_REAL_COMPETITORS: usize = 2;
pub const AUTO_ROUND_LIMIT_BASE: u32 = 64;
pub const AUTO_ROUND_LIMIT_PER_COMPETITOR: u32 = 4;

// ── Shared state type aliases ──────────────────────────────────────────

pub type CompetitorIndex = usize;
pub type MatchId = u64;
pub type SharedEngine = Arc<RwLock<TournamentEngine>>;
pub type EngineTable = HashMap<TournamentHandle, SharedEngine>;

// ── Domain types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TournamentHandle(pub u64);

impl fmt::Display for TournamentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub index: CompetitorIndex,
    pub label: String,
    pub score: i64,
    pub rounds_played: u32,
    pub synthetic: bool,
}

impl Competitor {
    pub fn real(index: CompetitorIndex, label: String) -> Self {
        Competitor {
            index,
            label,
            score: 0,
            rounds_played: 0,
            synthetic: false,
        }
    }

    /// `ordinal` counts padding entries from zero, so scores run -500, -501, ...
    pub fn synthetic(index: CompetitorIndex, ordinal: usize) -> Self {
        Competitor {
            index,
            label: format!("{SYNTHETIC_LABEL_PREFIX}{ordinal}"),
            score: SYNTHETIC_SCORE_BASE - ordinal as i64,
            rounds_played: 0,
            synthetic: true,
        }
    }

    /// Key used for Swiss-style grouping.
    pub fn group_key(&self) -> (u32, i64) {
        (self.rounds_played, self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub round: u32,
    pub position: usize,
    pub first: CompetitorIndex,
    pub second: CompetitorIndex,
    pub winner: Option<CompetitorIndex>,
    /// Set when the winner was implied by earlier results instead of played.
    pub inferred: bool,
}

impl Match {
    pub fn involves(&self, index: CompetitorIndex) -> bool {
        self.first == index || self.second == index
    }

    pub fn opponent_of(&self, index: CompetitorIndex) -> Option<CompetitorIndex> {
        if index == self.first {
            Some(self.second)
        } else if index == self.second {
            Some(self.first)
        } else {
            None
        }
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }

    pub fn loser(&self) -> Option<CompetitorIndex> {
        self.winner.and_then(|winner| self.opponent_of(winner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TournamentPhase {
    Seeding,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RoundStatus {
    /// The current round still has undecided matches; this is the next one.
    AwaitingMatch(Match),
    RoundAdvanced { round: u32 },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOrigin {
    Simulated,
    User,
}

/// The only data the match-count estimator consumes per finished tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCountObservation {
    pub real_competitor_count: usize,
    pub total_matches_played: usize,
    pub origin: RunOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub rank: usize,
    pub index: CompetitorIndex,
    pub label: String,
    pub score: i64,
    pub rounds_played: u32,
    pub beaten: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentSnapshot {
    pub phase: TournamentPhase,
    pub current_round: u32,
    pub cursor: usize,
    pub competitors: Vec<Competitor>,
    pub round_matches: Vec<Match>,
    pub total_matches_played: usize,
    pub auto_resolved: usize,
    pub byes_awarded: usize,
    pub rounds_completed: Option<u32>,
}

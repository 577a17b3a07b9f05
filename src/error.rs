use thiserror::Error;

use crate::types::{CompetitorIndex, MatchId, TournamentHandle, TournamentPhase};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    #[error("At least 2 competitors are required, got {supplied}")]
    InsufficientCompetitors { supplied: usize },

    #[error("Tournament has already been seeded")]
    AlreadySeeded,

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Match {match_id} is not part of the current round")]
    UnknownMatch { match_id: MatchId },

    #[error("Competitor {winner} did not play in match {match_id}")]
    InvalidWinner { match_id: MatchId, winner: CompetitorIndex },

    #[error("Match {match_id} already has a winner")]
    AlreadyDecided { match_id: MatchId },

    #[error("Tournament is not accepting results ({phase:?})")]
    NotActive { phase: TournamentPhase },

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("Win matrix cannot be resized after results were recorded")]
    InvalidState,

    #[error("Competitor index {index} is outside a {size}x{size} matrix")]
    OutOfRange { index: CompetitorIndex, size: usize },

    #[error("Competitor {index} cannot beat itself")]
    SelfMatch { index: CompetitorIndex },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown tournament handle {0}")]
    UnknownHandle(TournamentHandle),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Unknown decision source {0:?}, expected \"random\" or \"weighted\"")]
    UnknownDecision(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Anything that stops the collection binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

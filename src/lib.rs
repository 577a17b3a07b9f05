//! Swiss-style tournament scheduler for the image ranking game.
//!
//! Competitors are grouped by rounds played and score, paired inside each
//! group, and results are propagated through a transitively closed win
//! matrix so that already-implied matches are never played. The simulator
//! drives the same engine with random results to collect match-count data.

pub mod bracket;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod registry;
pub mod simulator;
pub mod types;
pub mod win_matrix;

pub use decision::{DecisionKind, DecisionSource, RandomDecision, SeededDecision, WeightedDecision};
pub use engine::{EngineConfig, TournamentEngine};
pub use error::{AppError, ConfigError, DatasetError, MatrixError, RegistryError, SeedError, SubmitError};
pub use registry::TournamentRegistry;
pub use simulator::{
    analyze_dataset, clean_dataset, load_dataset, save_dataset, CleaningReport, DatasetAnalysis, SimulationRecord,
    Simulator,
};
pub use types::*;
pub use win_matrix::WinMatrix;

use std::{fs, path::Path};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::{load_config, load_env_file, SimulatorConfig};

// ── Logging ────────────────────────────────────────────────────────────

/// Daily rolling file log under `logs_dir`. Keep the guard alive until exit.
pub fn init_tracing(logs_dir: &Path) -> WorkerGuard {
    fs::create_dir_all(logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(logs_dir, "image-bracket.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    guard
}

// ── Data collection ────────────────────────────────────────────────────

/// What one collection run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionReport {
    pub raw: DatasetAnalysis,
    pub cleaning: CleaningReport,
    pub cleaned: DatasetAnalysis,
}

/// Simulates every configured size, saves the raw and cleaned datasets and
/// analyses both.
pub fn run_collection(config: &SimulatorConfig) -> Result<CollectionReport, AppError> {
    let mut simulator = Simulator::from_config(config);
    let dataset = simulator.generate_dataset(
        config.min_competitors,
        config.max_competitors,
        config.simulations_per_size,
    );
    save_dataset(&config.dataset_path, &dataset)?;
    let raw = analyze_dataset(&dataset).ok_or(DatasetError::Empty)?;

    let (cleaned_records, cleaning) = clean_dataset(&dataset);
    save_dataset(&config.cleaned_dataset_path, &cleaned_records)?;
    let cleaned = analyze_dataset(&cleaned_records).ok_or(DatasetError::Empty)?;

    info!(
        simulations = raw.total_simulations,
        kept = cleaned.total_simulations,
        min_images = cleaned.min_images,
        max_images = cleaned.max_images,
        min_matches = cleaned.min_matches,
        max_matches = cleaned.max_matches,
        "dataset analysis"
    );
    for size in &cleaned.by_size {
        info!(
            n = size.n_images,
            runs = size.runs,
            avg = format_args!("{:.1}", size.avg),
            std = format_args!("{:.1}", size.std),
            min = size.min,
            max = size.max,
            "matches by size"
        );
    }
    Ok(CollectionReport { raw, cleaning, cleaned })
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() -> Result<(), AppError> {
    let env_keys = load_env_file();
    let config = load_config()?;
    let _guard = init_tracing(&config.logs_dir);
    if !env_keys.is_empty() {
        info!(keys = ?env_keys, "loaded .env");
    }
    info!(
        min = config.min_competitors,
        max = config.max_competitors,
        runs = config.simulations_per_size,
        seed = config.seed,
        decision = ?config.decision,
        "image bracket data collection starting"
    );
    if config.max_competitors > 256 {
        warn!(max = config.max_competitors, "large pools make the closure pass slow");
    }
    run_collection(&config)?;
    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{info, warn};

use crate::config::SimulatorConfig;
use crate::decision::{DecisionSource, RandomDecision, SeededDecision};
use crate::engine::{EngineConfig, TournamentEngine};
use crate::error::{DatasetError, SimulationError};
use crate::types::{MatchCountObservation, RunOrigin};

/// Outcome of one simulated tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRecord {
    pub n_images: usize,
    pub total_matches: usize,
    pub simulation_id: usize,
    pub real_images: usize,
    pub total_images_after_padding: usize,
    pub rounds_played: u32,
    pub is_completed: bool,
    pub auto_resolved: usize,
}

impl SimulationRecord {
    pub fn observation(&self) -> MatchCountObservation {
        MatchCountObservation {
            real_competitor_count: self.real_images,
            total_matches_played: self.total_matches,
            origin: RunOrigin::Simulated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeSummary {
    pub n_images: usize,
    pub runs: usize,
    pub avg: f64,
    pub min: usize,
    pub max: usize,
    pub std: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetAnalysis {
    pub total_simulations: usize,
    pub min_images: usize,
    pub max_images: usize,
    pub min_matches: usize,
    pub max_matches: usize,
    /// Ordered by `n_images`.
    pub by_size: Vec<SizeSummary>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFile {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<SimulationRecord>,
}

/// Plays whole tournaments with results drawn from a decision source.
pub struct Simulator<D: DecisionSource = RandomDecision> {
    engine_config: EngineConfig,
    source: D,
}

impl Simulator<RandomDecision> {
    pub fn new(seed: u64) -> Self {
        Simulator::with_source(RandomDecision::new(seed), EngineConfig::default())
    }
}

impl Simulator<SeededDecision> {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Simulator::with_source(config.decision.source(config.seed), config.engine_config())
    }
}

impl<D: DecisionSource> Simulator<D> {
    pub fn with_source(source: D, engine_config: EngineConfig) -> Self {
        Simulator { engine_config, source }
    }

    pub fn simulate_tournament(
        &mut self,
        n_images: usize,
        simulation_id: usize,
    ) -> Result<SimulationRecord, SimulationError> {
        let mut engine = TournamentEngine::new(self.engine_config);
        engine.seed((0..n_images).map(|i| format!("image-{i}")))?;
        let total_matches = engine.play_out(&mut self.source)?;
        Ok(SimulationRecord {
            n_images,
            total_matches,
            simulation_id,
            real_images: engine.real_competitor_count(),
            total_images_after_padding: engine.competitors().len(),
            rounds_played: engine.rounds_completed().unwrap_or_else(|| engine.current_round()),
            is_completed: engine.is_completed(),
            auto_resolved: engine.auto_resolved_count(),
        })
    }

    /// Runs `runs_per_size` tournaments for every size in `min_images..=max_images`.
    /// Failed runs are logged and skipped.
    pub fn generate_dataset(
        &mut self,
        min_images: usize,
        max_images: usize,
        runs_per_size: usize,
    ) -> Vec<SimulationRecord> {
        let mut dataset = Vec::new();
        for n in min_images..=max_images {
            info!(n, runs = runs_per_size, "simulating");
            for simulation_id in 0..runs_per_size {
                match self.simulate_tournament(n, simulation_id) {
                    Ok(record) => dataset.push(record),
                    Err(err) => warn!(n, simulation_id, error = %err, "simulation failed"),
                }
            }
        }
        dataset
    }
}

pub fn analyze_dataset(records: &[SimulationRecord]) -> Option<DatasetAnalysis> {
    let min_images = records.iter().map(|r| r.n_images).min()?;
    let max_images = records.iter().map(|r| r.n_images).max()?;
    let min_matches = records.iter().map(|r| r.total_matches).min()?;
    let max_matches = records.iter().map(|r| r.total_matches).max()?;

    let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.n_images).or_default().push(record.total_matches);
    }
    let by_size = grouped
        .into_iter()
        .map(|(n_images, matches)| {
            let runs = matches.len();
            let avg = matches.iter().sum::<usize>() as f64 / runs as f64;
            let variance = matches
                .iter()
                .map(|&m| (m as f64 - avg).powi(2))
                .sum::<f64>()
                / runs as f64;
            SizeSummary {
                n_images,
                runs,
                avg,
                min: matches.iter().copied().min().unwrap_or(0),
                max: matches.iter().copied().max().unwrap_or(0),
                std: variance.sqrt(),
            }
        })
        .collect();

    Some(DatasetAnalysis {
        total_simulations: records.len(),
        min_images,
        max_images,
        min_matches,
        max_matches,
        by_size,
    })
}

/// Records removed by each cleaning rule, in the order the rules run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningReport {
    pub original: usize,
    pub kept: usize,
    /// N of 2 or 3 with anything other than a single match.
    pub invalid_small: usize,
    pub outliers: usize,
    pub below_minimum: usize,
    pub above_maximum: usize,
}

impl CleaningReport {
    pub fn removed(&self) -> usize {
        self.original - self.kept
    }
}

/// Fewest and most matches a tournament over `n` real images can take.
pub fn match_bounds(n_images: usize) -> (usize, usize) {
    if n_images <= 3 {
        (1, 1)
    } else {
        (n_images - 1, n_images * (n_images - 1) / 2)
    }
}

/// Drops records the estimator should not learn from.
///
/// Rules run in order on what the previous rule kept: single-match check for
/// N of 2 or 3, per-N IQR fences (1.5 IQR) for N above 3, then the
/// `N-1 ..= N(N-1)/2` bounds.
pub fn clean_dataset(records: &[SimulationRecord]) -> (Vec<SimulationRecord>, CleaningReport) {
    let mut report = CleaningReport {
        original: records.len(),
        ..CleaningReport::default()
    };

    let mut kept: Vec<SimulationRecord> = records.to_vec();
    kept.retain(|r| {
        let valid = r.n_images > 3 || r.total_matches == 1;
        if !valid {
            report.invalid_small += 1;
        }
        valid
    });

    let mut by_size: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for record in kept.iter().filter(|r| r.n_images > 3) {
        by_size.entry(record.n_images).or_default().push(record.total_matches);
    }
    let fences: BTreeMap<usize, (f64, f64)> = by_size
        .into_iter()
        .map(|(n, mut matches)| {
            matches.sort_unstable();
            let q1 = quantile(&matches, 0.25);
            let q3 = quantile(&matches, 0.75);
            let iqr = q3 - q1;
            (n, (q1 - 1.5 * iqr, q3 + 1.5 * iqr))
        })
        .collect();
    kept.retain(|r| {
        let Some(&(low, high)) = fences.get(&r.n_images) else {
            return true;
        };
        let value = r.total_matches as f64;
        let inside = value >= low && value <= high;
        if !inside {
            report.outliers += 1;
        }
        inside
    });

    kept.retain(|r| {
        let (min, max) = match_bounds(r.n_images);
        if r.total_matches < min {
            report.below_minimum += 1;
            false
        } else if r.total_matches > max {
            report.above_maximum += 1;
            false
        } else {
            true
        }
    });

    report.kept = kept.len();
    info!(
        original = report.original,
        kept = report.kept,
        invalid_small = report.invalid_small,
        outliers = report.outliers,
        below_minimum = report.below_minimum,
        above_maximum = report.above_maximum,
        "dataset cleaned"
    );
    (kept, report)
}

// Linear interpolation between closest ranks over sorted input.
fn quantile(sorted: &[usize], q: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only as f64,
        _ => {
            let pos = q * (sorted.len() - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let base = sorted[lower] as f64;
            base + (sorted[upper] as f64 - base) * (pos - lower as f64)
        }
    }
}

pub fn save_dataset(path: &Path, records: &[SimulationRecord]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let file = DatasetFile {
        generated_at: Utc::now(),
        records: records.to_vec(),
    };
    let payload = serde_json::to_string_pretty(&file)?;
    fs::write(path, payload).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), records = records.len(), "dataset saved");
    Ok(())
}

pub fn load_dataset(path: &Path) -> Result<Vec<SimulationRecord>, DatasetError> {
    let data = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: DatasetFile = serde_json::from_str(&data)?;
    Ok(file.records)
}

use serde::{Deserialize, Serialize};
use std::{
  env,
  fs,
  path::{Path, PathBuf},
  str::FromStr,
};
use tracing::warn;

use crate::decision::DecisionKind;
use crate::engine::EngineConfig;
use crate::error::ConfigError;

pub const CONFIG_PATH_ENV: &str = "IMAGE_BRACKET_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "image_bracket.json";
pub const ENV_FILE: &str = ".env";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorConfig {
  pub min_competitors: usize,
  pub max_competitors: usize,
  pub simulations_per_size: usize,
  pub seed: u64,
  pub dataset_path: PathBuf,
  pub cleaned_dataset_path: PathBuf,
  pub logs_dir: PathBuf,
  pub auto_round_limit: Option<u32>,
  pub decision: DecisionKind,
}

impl Default for SimulatorConfig {
  fn default() -> Self {
    SimulatorConfig {
      min_competitors: 2,
      max_competitors: 64,
      simulations_per_size: 20,
      seed: 1337,
      dataset_path: PathBuf::from("data").join("tournament_dataset_v1.json"),
      cleaned_dataset_path: PathBuf::from("data").join("tournament_dataset_cleaned.json"),
      logs_dir: PathBuf::from("logs"),
      auto_round_limit: None,
      decision: DecisionKind::Random,
    }
  }
}

impl SimulatorConfig {
  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      auto_round_limit: self.auto_round_limit,
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.min_competitors < 2 {
      return Err(ConfigError::InvalidRange(format!(
        "minCompetitors must be at least 2, got {}",
        self.min_competitors
      )));
    }
    if self.max_competitors < self.min_competitors {
      return Err(ConfigError::InvalidRange(format!(
        "maxCompetitors ({}) is below minCompetitors ({})",
        self.max_competitors, self.min_competitors
      )));
    }
    if self.simulations_per_size == 0 {
      return Err(ConfigError::InvalidRange("simulationsPerSize must be at least 1".to_string()));
    }
    Ok(())
  }
}

pub fn config_path() -> PathBuf {
  env_default(CONFIG_PATH_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
  let raw = env_default(key)?;
  match raw.parse::<T>() {
    Ok(value) => Some(value),
    Err(_) => {
      warn!(key, value = %raw, "ignoring unparsable environment override");
      None
    }
  }
}

pub fn apply_env_overrides(mut config: SimulatorConfig) -> SimulatorConfig {
  if let Some(value) = env_parse("IMAGE_BRACKET_MIN_N") {
    config.min_competitors = value;
  }
  if let Some(value) = env_parse("IMAGE_BRACKET_MAX_N") {
    config.max_competitors = value;
  }
  if let Some(value) = env_parse("IMAGE_BRACKET_RUNS") {
    config.simulations_per_size = value;
  }
  if let Some(value) = env_parse("IMAGE_BRACKET_SEED") {
    config.seed = value;
  }
  if let Some(value) = env_default("IMAGE_BRACKET_DATASET") {
    config.dataset_path = PathBuf::from(value);
  }
  if let Some(value) = env_default("IMAGE_BRACKET_CLEANED_DATASET") {
    config.cleaned_dataset_path = PathBuf::from(value);
  }
  if let Some(value) = env_default("IMAGE_BRACKET_LOGS_DIR") {
    config.logs_dir = PathBuf::from(value);
  }
  if let Some(value) = env_parse("IMAGE_BRACKET_AUTO_ROUND_LIMIT") {
    config.auto_round_limit = Some(value);
  }
  if let Some(value) = env_parse("IMAGE_BRACKET_DECISION") {
    config.decision = value;
  }
  config
}

/// Reads the file if present (defaults otherwise), then applies the environment.
pub fn load_config() -> Result<SimulatorConfig, ConfigError> {
  load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<SimulatorConfig, ConfigError> {
  let config = read_config_file(path)?;
  let config = apply_env_overrides(config);
  config.validate()?;
  Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<SimulatorConfig, ConfigError> {
  if !path.is_file() {
    return Ok(SimulatorConfig::default());
  }
  let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.display().to_string(),
    source,
  })?;
  serde_json::from_str::<SimulatorConfig>(&data).map_err(|source| ConfigError::Json {
    path: path.display().to_string(),
    source,
  })
}

pub fn save_config(path: &Path, config: &SimulatorConfig) -> Result<(), ConfigError> {
  let payload = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
    path: path.display().to_string(),
    source,
  })?;
  fs::write(path, payload).map_err(|source| ConfigError::Io {
    path: path.display().to_string(),
    source,
  })
}

/// Loads `.env` from the working directory. Returns the keys it set.
pub fn load_env_file() -> Vec<String> {
  load_env_file_from(Path::new(ENV_FILE))
}

/// Variables already present in the environment win over the file.
pub fn load_env_file_from(path: &Path) -> Vec<String> {
  let Ok(contents) = fs::read_to_string(path) else {
    return Vec::new();
  };
  let mut applied = Vec::new();
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    if env::var_os(&key).is_some() {
      continue;
    }
    env::set_var(&key, value);
    applied.push(key);
  }
  applied
}

/// Parses `KEY=value`, `export KEY=value`, quoted values and trailing comments.
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let line = line.trim();
  if line.starts_with('#') {
    return None;
  }
  let line = line.strip_prefix("export ").unwrap_or(line);
  let (key, rest) = line.split_once('=')?;
  let key = key.trim();
  if key.is_empty() || key.contains(char::is_whitespace) {
    return None;
  }
  let rest = rest.trim();
  let value = unquote(rest).unwrap_or_else(|| rest.split(" #").next().unwrap_or_default().trim_end());
  Some((key.to_string(), value.to_string()))
}

fn unquote(value: &str) -> Option<&str> {
  ['"', '\''].into_iter().find_map(|quote| {
    value
      .strip_prefix(quote)
      .and_then(|inner| inner.strip_suffix(quote))
  })
}

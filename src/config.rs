use crate::types::*;
use serde::{Deserialize, Serialize};
use std::{
  env, fs,
  path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
  pub bind_addr: String,
  /// Where tournament records are persisted. Empty keeps everything in memory.
  pub data_dir: String,
  pub logs_dir: String,
  pub log_filter: String,
  /// `None` falls back to `BRACKET_DEFAULT_FORMAT`, then double elimination.
  pub default_format: Option<BracketFormat>,
  pub seeding: Seeding,
}

impl Default for AppConfig {
  fn default() -> Self {
    AppConfig {
      bind_addr: String::new(),
      data_dir: String::new(),
      logs_dir: String::new(),
      log_filter: "info".to_string(),
      default_format: None,
      seeding: Seeding::default(),
    }
  }
}

impl AppConfig {
  pub fn bind_addr(&self) -> &str {
    let trimmed = self.bind_addr.trim();
    if trimmed.is_empty() {
      DEFAULT_BIND_ADDR
    } else {
      trimmed
    }
  }

  pub fn data_dir(&self) -> Option<PathBuf> {
    let trimmed = self.data_dir.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(resolve_path(trimmed))
    }
  }

  pub fn logs_dir(&self) -> PathBuf {
    let trimmed = self.logs_dir.trim();
    if trimmed.is_empty() {
      resolve_path("logs")
    } else {
      resolve_path(trimmed)
    }
  }

  /// Settings applied to a tournament created without its own.
  pub fn default_settings(&self) -> BracketSettings {
    BracketSettings {
      format: self.default_format.unwrap_or_default(),
      seeding: self.seeding.clone(),
      ..BracketSettings::default()
    }
  }
}

pub fn working_root() -> PathBuf {
  env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn resolve_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    working_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  match env_default("BRACKET_CONFIG_PATH") {
    Some(raw) => resolve_path(&raw),
    None => working_root().join("config.json"),
  }
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  if config.bind_addr.trim().is_empty() {
    if let Some(value) = env_default("BRACKET_BIND_ADDR") {
      config.bind_addr = value;
    }
  }
  if config.data_dir.trim().is_empty() {
    if let Some(value) = env_default("BRACKET_DATA_DIR") {
      config.data_dir = value;
    }
  }
  if config.logs_dir.trim().is_empty() {
    if let Some(value) = env_default("BRACKET_LOGS_DIR") {
      config.logs_dir = value;
    }
  }
  if config.default_format.is_none() {
    config.default_format = env_default("BRACKET_DEFAULT_FORMAT").and_then(|value| value.parse().ok());
  }
  config
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  load_config_from(&config_path())
}

pub fn load_env_file() {
  let env_path = working_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

/// Startup warnings, collected so they can be logged once tracing is up.
pub fn env_warnings(config: &AppConfig) -> Vec<String> {
  let mut warnings = Vec::new();

  if config.data_dir().is_none() {
    warnings.push(
      "BRACKET_DATA_DIR not set and no dataDir in config; tournaments will not survive a restart".to_string(),
    );
  }
  if !config_path().is_file() {
    warnings.push("no config.json found; running on defaults and environment overrides".to_string());
  }
  if let Some(Err(e)) = env_default("BRACKET_DEFAULT_FORMAT").map(|value| value.parse::<BracketFormat>()) {
    warnings.push(format!("ignoring BRACKET_DEFAULT_FORMAT: {e}"));
  }
  warnings
}

pub fn log_env_warnings(config: &AppConfig) {
  for msg in env_warnings(config) {
    tracing::warn!("{}", msg);
  }
}

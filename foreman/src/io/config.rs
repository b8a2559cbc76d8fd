//! Supervisor configuration stored under `.foreman/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Supervisor configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable
/// and automatable. Missing fields default to sensible values. CLI
/// flags override these per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ForemanConfig {
    /// Maximum worker cycles per run.
    pub max_cycles: u32,

    /// Total wall-clock budget per run, in minutes.
    pub max_time_minutes: u64,

    /// Model passed to the worker CLI.
    pub model: String,

    /// Truncate worker stdout/stderr beyond this many bytes.
    pub spawn_output_limit_bytes: usize,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            max_time_minutes: 60,
            model: "opus".to_string(),
            spawn_output_limit_bytes: 1_000_000,
        }
    }
}

impl ForemanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_cycles == 0 {
            return Err(anyhow!("max_cycles must be > 0"));
        }
        if self.max_time_minutes == 0 {
            return Err(anyhow!("max_time_minutes must be > 0"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.spawn_output_limit_bytes == 0 {
            return Err(anyhow!("spawn_output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ForemanConfig::default()`.
pub fn load_config(path: &Path) -> Result<ForemanConfig> {
    if !path.exists() {
        let cfg = ForemanConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ForemanConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ForemanConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ForemanConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = ForemanConfig {
            max_cycles: 5,
            max_time_minutes: 30,
            model: "sonnet".to_string(),
            spawn_output_limit_bytes: 50_000,
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_cycles = 3\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_cycles, 3);
        assert_eq!(cfg.model, ForemanConfig::default().model);
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let cfg = ForemanConfig {
            max_cycles: 0,
            ..ForemanConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = ForemanConfig {
            max_time_minutes: 0,
            ..ForemanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}

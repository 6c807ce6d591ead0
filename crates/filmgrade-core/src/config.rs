//! Render configuration.
//!
//! Defaults come from the constants below, then environment overrides:
//!
//! - `FILMGRADE_BACKEND`: `cpu`, `gen1` or `gen2`
//! - `FILMGRADE_WORKERS`: batch worker threads (0 = one per core)
//! - `FILMGRADE_PARITY_TOLERANCE`: max allowed difference, normalized
//!
//! A JSON file may replace any subset of fields; env still wins over it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::lut::{Lut3D, LutError, MAX_LUT_SIZE};
use crate::parity::DEFAULT_PARITY_TOLERANCE;

/// Largest LUT grid accepted by default.
const DEFAULT_LUT_CUBE_MAX: u32 = 65;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Backend new renders start on.
    pub backend: BackendKind,
    /// Batch worker threads; 0 lets rayon pick.
    pub batch_workers: usize,
    /// Parity threshold, normalized.
    pub parity_tolerance: f32,
    /// Largest LUT grid size to load.
    pub lut_cube_max: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cpu,
            batch_workers: 0,
            parity_tolerance: DEFAULT_PARITY_TOLERANCE,
            lut_cube_max: DEFAULT_LUT_CUBE_MAX,
        }
    }
}

impl RenderConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a JSON file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        tracing::debug!(path = %path.display(), ?config, "loaded render config");
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps an env key to its value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("FILMGRADE_BACKEND") {
            self.backend = value.parse().map_err(|_| ConfigError::Env {
                key: "FILMGRADE_BACKEND",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("FILMGRADE_WORKERS") {
            self.batch_workers = value.trim().parse().map_err(|_| ConfigError::Env {
                key: "FILMGRADE_WORKERS",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("FILMGRADE_PARITY_TOLERANCE") {
            self.parity_tolerance = value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|t| t.is_finite() && *t > 0.0)
                .ok_or_else(|| ConfigError::Env {
                    key: "FILMGRADE_PARITY_TOLERANCE",
                    value: value.clone(),
                })?;
        }
        Ok(())
    }

    /// Reject grids above the configured limit.
    pub fn check_lut(&self, lut: &Lut3D) -> Result<(), LutError> {
        let limit = self.lut_cube_max.min(MAX_LUT_SIZE);
        if lut.size > limit {
            return Err(LutError::InvalidSize(format!(
                "{} exceeds configured maximum {limit}",
                lut.size
            )));
        }
        Ok(())
    }
}

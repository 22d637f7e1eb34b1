use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::blend::BlendWeights;
use crate::error::EngineError;
use crate::monte_carlo::DEFAULT_NUM_SIMULATIONS;
use crate::walk_forward::RatingConfig;

/// All model knobs in one explicit struct, threaded through construction
/// instead of living as ambient globals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub rating: RatingConfig,
    #[serde(default)]
    pub weights: BlendWeights,
    #[serde(default = "default_total_season_games")]
    pub total_season_games: u32,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: usize,
}

fn default_total_season_games() -> u32 {
    82
}

fn default_num_simulations() -> usize {
    DEFAULT_NUM_SIMULATIONS
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            rating: RatingConfig::default(),
            weights: BlendWeights::default(),
            total_season_games: default_total_season_games(),
            num_simulations: default_num_simulations(),
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.rating.validate()?;
        self.weights.validate()?;
        if self.num_simulations == 0 {
            return Err(EngineError::InvalidSimulationCount { requested: 0 });
        }
        Ok(())
    }
}

pub fn load_params(path: &Path) -> Result<ModelParams> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model params {}", path.display()))?;
    let params: ModelParams =
        serde_json::from_str(&raw).with_context(|| format!("parse model params {}", path.display()))?;
    params
        .validate()
        .with_context(|| format!("invalid model params {}", path.display()))?;
    Ok(params)
}

pub fn save_params(path: &Path, params: &ModelParams) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(params).context("serialize model params")?;
    fs::write(&tmp, json).context("write model params")?;
    fs::rename(&tmp, path).context("swap model params")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = ModelParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.rating.k, 32.0);
        assert_eq!(params.rating.initial, 1500.0);
        assert_eq!(params.weights.external, 0.70);
        assert_eq!(params.total_season_games, 82);
        assert_eq!(params.num_simulations, 10_000);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let params: ModelParams = serde_json::from_str(r#"{"total_season_games": 66}"#).unwrap();
        assert_eq!(params.total_season_games, 66);
        assert_eq!(params.rating.k, 32.0);
        assert_eq!(params.num_simulations, 10_000);
    }

    #[test]
    fn bad_weights_fail_validation() {
        let params: ModelParams =
            serde_json::from_str(r#"{"weights": {"external": 0.9, "rating": 0.3}}"#).unwrap();
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn zero_k_fails_validation() {
        let params: ModelParams =
            serde_json::from_str(r#"{"rating": {"k": 0.0, "initial": 1500.0}}"#).unwrap();
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidKFactor { .. })
        ));
    }
}

//! TOML-backed configuration for the optimizer knobs. CLI flags
//! override whatever a `--config` file sets; both are optional, and
//! everything has a documented default.

use serde::{Deserialize, Serialize};

use mfes_core::{CoordinatorConfig, FusionMethod, WeightMethod};

fn default_eta() -> f64 {
    3.0
}
fn default_rand_prob() -> f64 {
    0.3
}
fn default_power_num() -> f64 {
    3.0
}
fn default_random_state() -> u64 {
    1
}
fn default_time_limit_per_trial() -> u64 {
    600
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMethodName {
    RankLossPNorm,
    RankLossProb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethodName {
    Idp,
    Gpoe,
}

/// On-disk / CLI-overridable mirror of the core's fixed-at-construction
/// knobs. `r` has no default: the caller must provide a
/// maximum budget, either via `--r` or the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfesConfig {
    pub r: u64,
    #[serde(default = "default_eta")]
    pub eta: f64,
    #[serde(default)]
    pub skip_outer_loop: usize,
    #[serde(default = "default_rand_prob")]
    pub rand_prob: f64,
    #[serde(default = "default_true")]
    pub update_enable: bool,
    #[serde(default = "default_weight_method")]
    pub weight_method: WeightMethodName,
    #[serde(default = "default_fusion_method")]
    pub fusion_method: FusionMethodName,
    #[serde(default = "default_power_num")]
    pub power_num: f64,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default = "default_time_limit_per_trial")]
    pub time_limit_per_trial: u64,
    #[serde(default)]
    pub runtime_limit: Option<u64>,
}

fn default_weight_method() -> WeightMethodName {
    WeightMethodName::RankLossPNorm
}
fn default_fusion_method() -> FusionMethodName {
    FusionMethodName::Idp
}

impl MfesConfig {
    pub fn new(r: u64) -> Self {
        Self {
            r,
            eta: default_eta(),
            skip_outer_loop: 0,
            rand_prob: default_rand_prob(),
            update_enable: true,
            weight_method: default_weight_method(),
            fusion_method: default_fusion_method(),
            power_num: default_power_num(),
            random_state: default_random_state(),
            time_limit_per_trial: default_time_limit_per_trial(),
            runtime_limit: None,
        }
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Builds the `CoordinatorConfig` the core actually needs, computing the
    /// default `init_weight` ladder-length vector on the fly.
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        let mut coord = CoordinatorConfig::with_skip_outer_loop(self.r, self.eta, self.skip_outer_loop);
        coord.rand_prob = self.rand_prob;
        coord.update_enable = self.update_enable;
        coord.fusion_method = match self.fusion_method {
            FusionMethodName::Idp => FusionMethod::Idp,
            FusionMethodName::Gpoe => FusionMethod::Gpoe,
        };
        coord.weight_method = match self.weight_method {
            WeightMethodName::RankLossPNorm => WeightMethod::RankLossPNorm { power_num: self.power_num },
            WeightMethodName::RankLossProb => WeightMethod::RankLossProb { sample_num: 100 },
        };
        coord.random_state = self.random_state;
        coord
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults_round_trip_through_new() {
        let cfg = MfesConfig::new(81);
        assert_eq!(cfg.eta, 3.0);
        assert_eq!(cfg.skip_outer_loop, 0);
        assert_eq!(cfg.rand_prob, 0.3);
        assert!(cfg.update_enable);
        assert_eq!(cfg.power_num, 3.0);
        assert_eq!(cfg.random_state, 1);
        assert_eq!(cfg.time_limit_per_trial, 600);
    }

    #[test]
    fn skip_outer_loop_reaches_the_coordinator_config() {
        let mut cfg = MfesConfig::new(27);
        cfg.skip_outer_loop = 1;
        let coord = cfg.to_coordinator_config();
        assert_eq!(coord.ladder(), vec![3, 27]);
    }

    #[test]
    fn loads_partial_toml_with_defaults_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mfes.toml");
        std::fs::write(&path, "r = 27\neta = 3.0\n").unwrap();
        let cfg = MfesConfig::load(&path).unwrap();
        assert_eq!(cfg.r, 27);
        assert_eq!(cfg.rand_prob, 0.3);
    }
}

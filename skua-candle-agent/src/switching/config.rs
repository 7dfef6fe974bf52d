//! Configuration of the switched PPO trainer.
use super::GateThresholds;
use crate::{mlp::MlpConfig, model::ModelConfig, ppo::PpoConfig};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use skua_core::error::SkuaError;
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SwitchedPpo`](super::SwitchedPpo).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SwitchedPpoConfig {
    /// Configuration of the inner PPO trainer.
    pub ppo_config: PpoConfig,

    /// Configuration of the gate network and its optimizer.
    ///
    /// The gate outputs a single logit; path probabilities are taken
    /// through a sigmoid.
    pub gate_config: ModelConfig<MlpConfig>,

    /// Threshold rule of the path selection.
    pub gate_thresholds: GateThresholds,

    /// Steps a selected action is repeated before the next decision.
    /// `None` decides every step.
    pub hold_count: Option<usize>,

    /// Minibatch size of gate updates.
    pub gate_batch_size: usize,

    /// Passes over the batch per gate update.
    pub g_epochs: usize,
}

impl Default for SwitchedPpoConfig {
    fn default() -> Self {
        Self {
            ppo_config: Default::default(),
            gate_config: Default::default(),
            gate_thresholds: Default::default(),
            hold_count: None,
            gate_batch_size: 1024,
            g_epochs: 10,
        }
    }
}

impl SwitchedPpoConfig {
    /// Sets the inner PPO configuration.
    pub fn ppo_config(mut self, v: PpoConfig) -> Self {
        self.ppo_config = v;
        self
    }

    /// Sets the gate model configuration.
    pub fn gate_config(mut self, v: ModelConfig<MlpConfig>) -> Self {
        self.gate_config = v;
        self
    }

    /// Threshold rule.
    pub fn gate_thresholds(mut self, v: GateThresholds) -> Self {
        self.gate_thresholds = v;
        self
    }

    /// Action-hold length.
    pub fn hold_count(mut self, v: usize) -> Self {
        self.hold_count = Some(v);
        self
    }

    /// Rejects out-of-range hyper-parameters.
    pub fn validate(&self) -> Result<()> {
        self.ppo_config.validate()?;
        match self.gate_thresholds {
            GateThresholds::Single(t) => {
                if !(t > 0.0 && t < 1.0) {
                    return Err(SkuaError::invalid_config("gate_thresholds", t).into());
                }
            }
            GateThresholds::Hysteresis { lower, upper } => {
                if !(lower > 0.0 && lower < upper && upper < 1.0) {
                    return Err(SkuaError::invalid_config(
                        "gate_thresholds",
                        format!("({}, {})", lower, upper),
                    )
                    .into());
                }
            }
        }
        for (name, v) in [
            ("gate_batch_size", self.gate_batch_size),
            ("g_epochs", self.g_epochs),
        ] {
            if v == 0 {
                return Err(SkuaError::invalid_config(name, v).into());
            }
        }
        Ok(())
    }

    /// Constructs [`SwitchedPpoConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!(
            "Load config of switched PPO trainer from {}",
            path_.to_str().unwrap()
        );
        Ok(b)
    }

    /// Saves [`SwitchedPpoConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!(
            "Save config of switched PPO trainer into {}",
            path_.to_str().unwrap()
        );
        Ok(())
    }
}

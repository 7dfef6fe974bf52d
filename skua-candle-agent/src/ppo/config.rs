//! Configuration of the PPO trainer.
use crate::{mlp::MlpConfig, model::ModelConfig, Device};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use skua_core::error::SkuaError;
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Ppo`](super::Ppo).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PpoConfig {
    /// Configuration of the policy network and its optimizer.
    pub policy_config: ModelConfig<MlpConfig>,

    /// Configuration of the value network and its optimizer.
    pub value_config: ModelConfig<MlpConfig>,

    /// Discount factor.
    pub gamma: f32,

    /// Decay of the advantage estimation.
    pub lam: f32,

    /// Clipping parameter of the surrogate objective.
    pub eps: f32,

    /// Standard deviation of the Gaussian policy.
    pub action_std: f64,

    /// Environment steps collected per outer iteration.
    pub epoch_batch_size: usize,

    /// Minibatch size of policy updates.
    pub policy_batch_size: usize,

    /// Minibatch size of value updates.
    pub value_batch_size: usize,

    /// Passes over the batch per policy update.
    pub p_epochs: usize,

    /// Passes over the batch per value update.
    pub v_epochs: usize,

    /// Step ceiling of a single episode.
    pub max_ep_steps: usize,

    /// Total environment step ceiling of the run.
    pub total_steps: usize,

    /// Stops the run early once two consecutive batch rewards reach this.
    pub reward_stop: Option<f32>,

    /// Seed of the minibatch shuffling RNG.
    pub seed: u64,

    /// Device for the models.
    pub device: Option<Device>,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            policy_config: Default::default(),
            value_config: Default::default(),
            gamma: 0.99,
            lam: 0.99,
            eps: 0.2,
            action_std: 0.1,
            epoch_batch_size: 2048,
            policy_batch_size: 1024,
            value_batch_size: 1024,
            p_epochs: 10,
            v_epochs: 1,
            max_ep_steps: 1000,
            total_steps: 200_000,
            reward_stop: None,
            seed: 0,
            device: None,
        }
    }
}

impl PpoConfig {
    /// Sets the policy model configuration.
    pub fn policy_config(mut self, v: ModelConfig<MlpConfig>) -> Self {
        self.policy_config = v;
        self
    }

    /// Sets the value model configuration.
    pub fn value_config(mut self, v: ModelConfig<MlpConfig>) -> Self {
        self.value_config = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// GAE decay.
    pub fn lam(mut self, v: f32) -> Self {
        self.lam = v;
        self
    }

    /// Clipping parameter.
    pub fn clip_eps(mut self, v: f32) -> Self {
        self.eps = v;
        self
    }

    /// Policy standard deviation.
    pub fn action_std(mut self, v: f64) -> Self {
        self.action_std = v;
        self
    }

    /// Environment steps per outer iteration.
    pub fn epoch_batch_size(mut self, v: usize) -> Self {
        self.epoch_batch_size = v;
        self
    }

    /// Episode step ceiling.
    pub fn max_ep_steps(mut self, v: usize) -> Self {
        self.max_ep_steps = v;
        self
    }

    /// Total environment step ceiling.
    pub fn total_steps(mut self, v: usize) -> Self {
        self.total_steps = v;
        self
    }

    /// Reward threshold of the early-stop rule.
    pub fn reward_stop(mut self, v: f32) -> Self {
        self.reward_stop = Some(v);
        self
    }

    /// RNG seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Rejects out-of-range hyper-parameters.
    ///
    /// Runs before any environment interaction.
    pub fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(SkuaError::invalid_config("gamma", self.gamma).into());
        }
        if !(self.lam > 0.0 && self.lam <= 1.0) {
            return Err(SkuaError::invalid_config("lam", self.lam).into());
        }
        if self.eps <= 0.0 {
            return Err(SkuaError::invalid_config("eps", self.eps).into());
        }
        if self.action_std <= 0.0 {
            return Err(SkuaError::invalid_config("action_std", self.action_std).into());
        }
        for (name, v) in [
            ("epoch_batch_size", self.epoch_batch_size),
            ("policy_batch_size", self.policy_batch_size),
            ("value_batch_size", self.value_batch_size),
            ("p_epochs", self.p_epochs),
            ("v_epochs", self.v_epochs),
            ("max_ep_steps", self.max_ep_steps),
        ] {
            if v == 0 {
                return Err(SkuaError::invalid_config(name, v).into());
            }
        }
        Ok(())
    }

    /// Constructs [`PpoConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of PPO trainer from {}", path_.to_str().unwrap());
        Ok(b)
    }

    /// Saves [`PpoConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of PPO trainer into {}", path_.to_str().unwrap());
        Ok(())
    }
}

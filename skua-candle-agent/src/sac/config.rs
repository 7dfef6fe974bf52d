//! Configuration of the SAC trainer.
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

/// Configuration of [`Sac`](super::Sac).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SacConfig {
    /// Configuration of the policy network and its optimizer.
    pub policy_config: ModelConfig<MlpConfig>,

    /// Configuration of the value network and its optimizer.
    pub value_config: ModelConfig<MlpConfig>,

    /// Configuration of the twin Q networks and their optimizers.
    pub q_config: ModelConfig<MlpConfig>,

    /// Discount factor.
    pub gamma: f64,

    /// Polyak coefficient of the target network average.
    pub polyak: f64,

    /// Entropy coefficient.
    pub alpha: f64,

    /// Floor inside the log of the squashing correction.
    pub epsilon: f64,

    /// Lower clamp of the policy log-std head.
    pub min_lstd: f64,

    /// Upper clamp of the policy log-std head.
    pub max_lstd: f64,

    /// Environment steps collected per outer iteration.
    pub epoch_batch_size: usize,

    /// Transitions sampled from the replay buffer per outer iteration.
    pub replay_batch_size: usize,

    /// Minibatch size of policy updates.
    pub pol_batch_size: usize,

    /// Minibatch size of value updates.
    pub val_batch_size: usize,

    /// Minibatch size of Q updates.
    pub q_batch_size: usize,

    /// Capacity of the replay buffer.
    pub replay_buf_size: usize,

    /// Step ceiling of a single episode.
    pub max_ep_steps: usize,

    /// Total environment step ceiling of the run.
    pub total_steps: usize,

    /// Stops the run early once two consecutive batch rewards reach this.
    pub reward_stop: Option<f32>,

    /// Seed of the buffer and minibatch RNGs.
    pub seed: u64,

    /// Device for the models.
    pub device: Option<Device>,
}

impl Default for SacConfig {
    fn default() -> Self {
        Self {
            policy_config: Default::default(),
            value_config: Default::default(),
            q_config: Default::default(),
            gamma: 0.95,
            polyak: 0.9,
            alpha: 0.9,
            epsilon: 1e-6,
            min_lstd: -20.0,
            max_lstd: 2.0,
            epoch_batch_size: 2048,
            replay_batch_size: 2048,
            pol_batch_size: 1024,
            val_batch_size: 1024,
            q_batch_size: 1024,
            replay_buf_size: 10000,
            max_ep_steps: 1000,
            total_steps: 200_000,
            reward_stop: None,
            seed: 0,
            device: None,
        }
    }
}

impl SacConfig {
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

    /// Sets the Q model configuration (used for both critics).
    pub fn q_config(mut self, v: ModelConfig<MlpConfig>) -> Self {
        self.q_config = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Polyak coefficient.
    pub fn polyak(mut self, v: f64) -> Self {
        self.polyak = v;
        self
    }

    /// Entropy coefficient.
    pub fn alpha(mut self, v: f64) -> Self {
        self.alpha = v;
        self
    }

    /// Environment steps per outer iteration.
    pub fn epoch_batch_size(mut self, v: usize) -> Self {
        self.epoch_batch_size = v;
        self
    }

    /// Replay batch size.
    pub fn replay_batch_size(mut self, v: usize) -> Self {
        self.replay_batch_size = v;
        self
    }

    /// Replay buffer capacity.
    pub fn replay_buf_size(mut self, v: usize) -> Self {
        self.replay_buf_size = v;
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
        if !(self.polyak > 0.0 && self.polyak < 1.0) {
            return Err(SkuaError::invalid_config("polyak", self.polyak).into());
        }
        if self.alpha < 0.0 {
            return Err(SkuaError::invalid_config("alpha", self.alpha).into());
        }
        if self.epsilon <= 0.0 {
            return Err(SkuaError::invalid_config("epsilon", self.epsilon).into());
        }
        if self.min_lstd >= self.max_lstd {
            return Err(SkuaError::invalid_config("min_lstd", self.min_lstd).into());
        }
        for (name, v) in [
            ("epoch_batch_size", self.epoch_batch_size),
            ("replay_batch_size", self.replay_batch_size),
            ("pol_batch_size", self.pol_batch_size),
            ("val_batch_size", self.val_batch_size),
            ("q_batch_size", self.q_batch_size),
            ("replay_buf_size", self.replay_buf_size),
            ("max_ep_steps", self.max_ep_steps),
        ] {
            if v == 0 {
                return Err(SkuaError::invalid_config(name, v).into());
            }
        }
        Ok(())
    }

    /// Constructs [`SacConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC trainer from {}", path_.to_str().unwrap());
        Ok(b)
    }

    /// Saves [`SacConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC trainer into {}", path_.to_str().unwrap());
        Ok(())
    }
}

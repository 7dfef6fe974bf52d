//! Environment.
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Kind of action space declared by an environment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ActionSpace {
    /// Continuous box of `dim` action components, each bounded by
    /// `[low, high]`.
    Continuous {
        /// Number of action components.
        dim: usize,
        /// Lower bound of each component.
        low: f32,
        /// Upper bound of each component.
        high: f32,
    },

    /// Discrete space with `n` actions, encoded as a scalar index.
    Discrete {
        /// Number of actions.
        n: usize,
    },
}

impl ActionSpace {
    /// Length of the action vector fed to [`Env::step`].
    ///
    /// Discrete actions are a single index.
    pub fn act_len(&self) -> usize {
        match self {
            Self::Continuous { dim, .. } => *dim,
            Self::Discrete { .. } => 1,
        }
    }
}

/// The result of one environment step.
pub struct EnvStep {
    /// Observation after the step.
    pub obs: Vec<f32>,

    /// Reward of the step.
    pub reward: f32,

    /// Terminal flag.
    pub done: bool,
}

/// Represents an environment, typically an MDP.
///
/// The simulation itself is an external collaborator; the training core
/// only drives `reset`/`step` and reads the declared spaces.
pub trait Env {
    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performs an environment step.
    fn step(&mut self, act: &[f32]) -> Result<EnvStep>;

    /// Action space of the environment.
    fn action_space(&self) -> ActionSpace;

    /// Observation dimensionality.
    fn obs_dim(&self) -> usize;
}

#![warn(missing_docs)]
//! A library for reinforcement learning.
//!
//! This crate provides the backend-free half of the training core: the
//! environment and policy interfaces, transitions and trajectories, a
//! replay buffer for off-policy learning, advantage estimation for
//! on-policy learning, a rollout sampler, and training-run bookkeeping.
//! Gradient-based trainers built on these abstractions live in the
//! `skua-candle-agent` crate.
pub mod error;
pub mod record;

mod base;
pub use base::{ActionSpace, Env, EnvStep, StochasticPolicy, Trajectory, Transition};

mod advantage;
pub use advantage::{discount_cumsum, gae};

mod buffer;
pub use buffer::{ReplayBuffer, SampledBatch};

mod rollout;
pub use rollout::Sampler;

mod train;
pub use train::TrainingState;

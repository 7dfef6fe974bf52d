//! SAC trainer.
//!
//! Off-policy actor-critic with twin Q-functions, entropy regularization
//! and a polyak-averaged target value network. Continuous actions are
//! produced by sampling a Gaussian in an unbounded space and squashing
//! through tanh with the Jacobian correction applied to the
//! log-probability.
mod base;
mod config;

pub use base::{Sac, SacOutput};
pub use config::SacConfig;

//! PPO trainer.
//!
//! On-policy actor-critic with a clipped surrogate objective and
//! generalized advantage estimation. The policy is a Gaussian with a
//! fixed standard deviation over an MLP mean.
mod base;
mod config;

pub use base::{Ppo, PpoOutput};
pub(crate) use base::OnPolicyBatch;
pub use config::PpoConfig;

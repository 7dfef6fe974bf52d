//! Core interfaces and data types.
mod env;
mod policy;
mod transition;

pub use env::{ActionSpace, Env, EnvStep};
pub use policy::StochasticPolicy;
pub use transition::{Trajectory, Transition};

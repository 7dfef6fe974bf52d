//! Switching controller and its PPO variant.
//!
//! Composes the learned Gaussian actor with an externally supplied
//! nominal control law through a learned scalar gate. Path selection is
//! a single threshold or a hysteresis rule with two thresholds and a
//! remembered prior path; an optional action hold repeats the selected
//! action between decisions. [`SwitchedPpo`] trains the actor on the
//! learned-path steps only and the gate as a binary classifier against
//! the path labels recorded during collection.
mod base;
mod config;
mod gate;

pub use base::{HeldPolicy, NominalController, SwitchedPpo, SwitchedPpoOutput};
pub use config::SwitchedPpoConfig;
pub use gate::{ActionHold, GateState, GateThresholds};

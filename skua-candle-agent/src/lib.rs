//! RL trainers implemented with [candle](https://crates.io/crates/candle-core).
//!
//! Three engines on top of `skua-core`:
//! - [`ppo::Ppo`], an on-policy actor-critic with a clipped surrogate
//!   objective and generalized advantage estimation;
//! - [`sac::Sac`], an off-policy actor-critic with twin Q-functions,
//!   entropy regularization and a polyak-averaged target network;
//! - [`switching::SwitchedPpo`], the PPO variant that gates between the
//!   learned policy and a nominal controller with a trained gate.
pub mod mlp;
pub mod model;
pub mod opt;
pub mod ppo;
pub mod sac;
pub mod switching;
pub mod util;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support
/// serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl From<candle_core::Device> for Device {
    fn from(device: candle_core::Device) -> Self {
        match device {
            candle_core::Device::Cpu => Self::Cpu,
            _ => unimplemented!(),
        }
    }
}

impl From<Device> for candle_core::Device {
    fn from(device: Device) -> Self {
        match device {
            Device::Cpu => candle_core::Device::Cpu,
            Device::Cuda(n) => candle_core::Device::new_cuda(n).unwrap(),
        }
    }
}

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Output activation of an [`Mlp`](mlp::Mlp).
pub enum Activation {
    /// No activation in the final layer.
    Linear,

    /// Rectified linear unit.
    Relu,

    /// Hyperbolic tangent.
    Tanh,

    /// Logistic sigmoid.
    Sigmoid,
}

impl Activation {
    /// Applies the activation.
    pub fn forward(&self, xs: &candle_core::Tensor) -> candle_core::Tensor {
        match self {
            Self::Linear => xs.clone(),
            Self::Relu => xs.relu().unwrap(),
            Self::Tanh => xs.tanh().unwrap(),
            Self::Sigmoid => candle_nn::ops::sigmoid(xs).unwrap(),
        }
    }
}

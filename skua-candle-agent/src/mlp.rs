//! Multilayer perceptron.
mod base;
mod config;
mod gauss;
use crate::Activation;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::MlpConfig;
pub use gauss::GaussHeadMlp;

fn mlp_forward(xs: Tensor, layers: &[Linear], final_act: &Activation) -> Tensor {
    let n_layers = layers.len();
    let mut xs = xs;

    for layer in layers.iter().take(n_layers - 1) {
        xs = layer.forward(&xs).unwrap().relu().unwrap();
    }

    let xs = layers[n_layers - 1].forward(&xs).unwrap();
    final_act.forward(&xs)
}

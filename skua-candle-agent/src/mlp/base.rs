use super::{mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
///
/// An empty `units` list yields a single linear map.
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend_from_slice(&config.units);
    dims.push(config.out_dim);
    let vs = vs.pp(prefix);

    Ok(dims
        .windows(2)
        .enumerate()
        .map(|(i, w)| linear(w[0] as _, w[1] as _, vs.pp(format!("ln{}", i))).unwrap())
        .collect())
}

/// Multilayer perceptron with ReLU hidden activations.
///
/// As a [`SubModel1`] it maps one input to one output (value function,
/// policy mean, gate); as a [`SubModel2`] it concatenates its two inputs
/// along the last dimension (Q-function over observation and action).
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

fn _build(vs: VarBuilder, config: MlpConfig) -> Mlp {
    let device = vs.device().clone();
    let layers = create_linear_layers("mlp", vs, &config).unwrap();

    Mlp {
        config,
        device,
        layers,
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Tensor {
        let xs = xs.to_device(&self.device).unwrap();
        mlp_forward(xs, &self.layers, &self.config.out_activation)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let input1 = input1.to_device(&self.device).unwrap();
        let input2 = input2.to_device(&self.device).unwrap();
        let input = Tensor::cat(&[input1, input2], D::Minus1).unwrap();
        mlp_forward(input, &self.layers, &self.config.out_activation)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }
}

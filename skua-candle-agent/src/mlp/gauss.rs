use super::MlpConfig;
use crate::model::SubModel1;
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// MLP trunk with separate mean and log-std heads.
///
/// Parameterizes the Gaussian policy of the off-policy trainer; the heads
/// share the trunk. Outputs `(mean, lstd)`, both of width `out_dim`.
pub struct GaussHeadMlp {
    _config: MlpConfig,
    device: Device,
    trunk: Vec<Linear>,
    mean_head: Linear,
    lstd_head: Linear,
}

impl SubModel1 for GaussHeadMlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn forward(&self, xs: &Self::Input) -> Self::Output {
        let mut xs = xs.to_device(&self.device).unwrap();
        for layer in self.trunk.iter() {
            xs = layer.forward(&xs).unwrap().relu().unwrap();
        }
        let mean = self.mean_head.forward(&xs).unwrap();
        let lstd = self.lstd_head.forward(&xs).unwrap();
        (mean, lstd)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        let device = vs.device().clone();
        let trunk = {
            let mut dims = vec![config.in_dim];
            dims.extend_from_slice(&config.units);
            let vs = vs.pp("mlp");
            dims.windows(2)
                .enumerate()
                .map(|(i, w)| linear(w[0] as _, w[1] as _, vs.pp(format!("ln{}", i))).unwrap())
                .collect()
        };
        let (mean_head, lstd_head) = {
            let in_dim = *config.units.last().unwrap_or(&config.in_dim);
            let out_dim = config.out_dim;
            let mean_head = linear(in_dim as _, out_dim as _, vs.pp("mean")).unwrap();
            let lstd_head = linear(in_dim as _, out_dim as _, vs.pp("lstd")).unwrap();
            (mean_head, lstd_head)
        };

        Self {
            _config: config,
            device,
            trunk,
            mean_head,
            lstd_head,
        }
    }
}

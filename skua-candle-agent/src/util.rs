//! Utilities.
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::VarMap;

/// Interface for handling output dimensions of network configurations.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: i64);
}

/// Polyak-averages `live` into `target`, variable by variable.
///
/// Variables are identified by their names:
///
/// target = polyak * target + (1 - polyak) * live
///
/// The update is functional and elementwise; the target never receives
/// gradients.
pub fn polyak_update(target: &VarMap, live: &VarMap, polyak: f64) -> Result<()> {
    let target = target.data().lock().unwrap();
    let live = live.data().lock().unwrap();

    target.iter().for_each(|(k, v_target)| {
        let v_live = live.get(k).unwrap();
        let t_live = v_live.as_tensor();
        let t_target = v_target.as_tensor();
        let t_new = ((polyak * t_target).unwrap() + (1.0 - polyak) * t_live).unwrap();
        v_target.set(&t_new).unwrap();
    });

    Ok(())
}

/// Copies every variable of `src` into `dest` by name.
///
/// Used for deep-copy-on-snapshot of networks (`old_policy`, target
/// networks); the two varmaps stay independent afterwards.
pub fn copy_params(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest.data().lock().unwrap();
    let src = src.data().lock().unwrap();

    dest.iter().for_each(|(k, v_dest)| {
        let v_src = src.get(k).unwrap();
        v_dest.set(v_src.as_tensor()).unwrap();
    });

    Ok(())
}

/// Log density of standard-normal noise `z` under `N(mean, exp(lstd))`,
/// summed over action dimensions.
pub fn normal_logp(z: &Tensor, lstd: &Tensor) -> Result<Tensor> {
    let c = -0.5 * (2.0 * std::f32::consts::PI).ln() as f64;
    let logp = ((c - lstd)? - (0.5 * z.powf(2.0)?)?)?;
    Ok(logp.sum(D::Minus1)?)
}

/// Jacobian correction of the tanh squashing, `sum log(1 - tanh(x)^2 + eps)`.
///
/// `a` is the squashed action before scaling. The floor `eps` guards the
/// logarithm at saturation; omitting it silently biases the entropy term.
pub fn squash_correction(a: &Tensor, eps: f64) -> Result<Tensor> {
    Ok(((1f64 - a.powf(2.0)?)? + eps)?.log()?.sum(D::Minus1)?)
}

/// Gathers rows `ixs` out of row-major data of width `dim`.
pub fn gather_rows(data: &[f32], dim: usize, ixs: &[usize]) -> Vec<f32> {
    let mut out = Vec::with_capacity(ixs.len() * dim);
    for &ix in ixs.iter() {
        out.extend_from_slice(&data[ix * dim..(ix + 1) * dim]);
    }
    out
}

/// Builds a `[n, dim]` tensor from row-major data.
pub fn rows_to_tensor(data: &[f32], n: usize, dim: usize, device: &Device) -> Result<Tensor> {
    debug_assert_eq!(data.len(), n * dim);
    Ok(Tensor::from_slice(data, (n, dim), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;

    fn varmap_with(name: &str, vals: &[f32]) -> VarMap {
        let vm = VarMap::new();
        let init = Init::Const(0.0);
        vm.get((vals.len(),), name, init, DType::F32, &Device::Cpu)
            .unwrap();
        let t = Tensor::from_slice(vals, (vals.len(),), &Device::Cpu).unwrap();
        vm.data().lock().unwrap().get(name).unwrap().set(&t).unwrap();
        vm
    }

    #[test]
    fn polyak_update_is_exact_elementwise() {
        let polyak = 0.9;
        let target = varmap_with("w", &[4.0, 5.0, 6.0]);
        let live = varmap_with("w", &[1.0, 2.0, 3.0]);

        polyak_update(&target, &live, polyak).unwrap();

        let got = target
            .data()
            .lock()
            .unwrap()
            .get("w")
            .unwrap()
            .as_tensor()
            .to_vec1::<f32>()
            .unwrap();
        let expected = [
            0.9 * 4.0 + 0.1 * 1.0,
            0.9 * 5.0 + 0.1 * 2.0,
            0.9 * 6.0 + 0.1 * 3.0,
        ];
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() < 1e-6);
        }
    }

    #[test]
    fn copy_params_detaches_from_source() {
        let dest = varmap_with("w", &[0.0, 0.0]);
        let src = varmap_with("w", &[1.5, -2.5]);
        copy_params(&dest, &src).unwrap();

        // Mutating the source afterwards must not touch the copy.
        let t = Tensor::from_slice(&[9.0f32, 9.0], (2,), &Device::Cpu).unwrap();
        src.data().lock().unwrap().get("w").unwrap().set(&t).unwrap();

        let got = dest
            .data()
            .lock()
            .unwrap()
            .get("w")
            .unwrap()
            .as_tensor()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(got, vec![1.5, -2.5]);
    }

    #[test]
    fn normal_logp_of_zero_noise() {
        let z = Tensor::zeros((1, 2), DType::F32, &Device::Cpu).unwrap();
        let lstd = Tensor::zeros((1, 2), DType::F32, &Device::Cpu).unwrap();
        let logp = normal_logp(&z, &lstd).unwrap().to_vec1::<f32>().unwrap();
        let expected = -(2.0 * std::f32::consts::PI).ln(); // two dims at the mode
        assert!((logp[0] - expected).abs() < 1e-5);
    }
}

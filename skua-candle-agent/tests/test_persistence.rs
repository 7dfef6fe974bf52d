use anyhow::Result;
use candle_core::{Device, Tensor};
use skua_candle_agent::{
    mlp::{Mlp, MlpConfig},
    model::{Model1, Model2, ModelConfig},
    ppo::PpoConfig,
    sac::SacConfig,
    switching::{GateThresholds, SwitchedPpoConfig},
    Activation,
};
use tempdir::TempDir;

fn net_config() -> MlpConfig {
    MlpConfig::new(3, vec![8, 8], 2, Activation::Tanh)
}

#[test]
fn ppo_config_yaml_round_trip() -> Result<()> {
    let dir = TempDir::new("skua_test")?;
    let path = dir.path().join("ppo.yaml");

    let config = PpoConfig::default()
        .policy_config(ModelConfig::default().net_config(net_config()).out_dim(1))
        .value_config(ModelConfig::default().net_config(net_config()))
        .discount_factor(0.97)
        .clip_eps(0.1)
        .epoch_batch_size(512)
        .reward_stop(100.0)
        .seed(7);
    config.save(&path)?;

    assert_eq!(PpoConfig::load(&path)?, config);
    Ok(())
}

#[test]
fn sac_config_yaml_round_trip() -> Result<()> {
    let dir = TempDir::new("skua_test")?;
    let path = dir.path().join("sac.yaml");

    let config = SacConfig::default()
        .policy_config(ModelConfig::default().net_config(net_config()))
        .value_config(ModelConfig::default().net_config(net_config()))
        .q_config(ModelConfig::default().net_config(net_config()))
        .polyak(0.99)
        .alpha(0.2)
        .replay_buf_size(50_000)
        .seed(7);
    config.save(&path)?;

    assert_eq!(SacConfig::load(&path)?, config);
    Ok(())
}

#[test]
fn switched_ppo_config_yaml_round_trip() -> Result<()> {
    let dir = TempDir::new("skua_test")?;
    let path = dir.path().join("switched_ppo.yaml");

    let config = SwitchedPpoConfig::default()
        .gate_config(ModelConfig::default().net_config(net_config()))
        .gate_thresholds(GateThresholds::Hysteresis {
            lower: 0.2,
            upper: 0.8,
        })
        .hold_count(4);
    config.save(&path)?;

    assert_eq!(SwitchedPpoConfig::load(&path)?, config);
    Ok(())
}

#[test]
fn model2_clone_is_a_deep_copy() -> Result<()> {
    let config = ModelConfig::default().net_config(net_config());
    let src = Model2::<Mlp>::build(config, Device::Cpu)?;
    let copy = src.clone();

    let obs = Tensor::from_slice(&[0.2f32, -0.4], (1, 2), &Device::Cpu)?;
    let act = Tensor::from_slice(&[0.9f32], (1, 1), &Device::Cpu)?;
    let expected = src.forward(&obs, &act).to_vec2::<f32>()?;

    // Zeroing the source afterwards must not touch the copy.
    for (_, v) in src.varmap().data().lock().unwrap().iter() {
        v.set(&v.as_tensor().zeros_like()?)?;
    }

    let got = copy.forward(&obs, &act).to_vec2::<f32>()?;
    for (g, e) in got[0].iter().zip(expected[0].iter()) {
        assert!((g - e).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn model_params_survive_save_and_load() -> Result<()> {
    let dir = TempDir::new("skua_test")?;
    let path = dir.path().join("model.safetensors");

    let config = ModelConfig::default().net_config(net_config());
    let src = Model1::<Mlp>::build(config.clone(), Device::Cpu)?;
    src.save(&path)?;

    let obs = Tensor::from_slice(&[0.3f32, -1.0, 0.7], (1, 3), &Device::Cpu)?;
    let expected = src.forward(&obs).to_vec2::<f32>()?;

    // A freshly built model diverges until the saved parameters are
    // loaded into it.
    let mut dest = Model1::<Mlp>::build(config, Device::Cpu)?;
    dest.load(&path)?;
    let got = dest.forward(&obs).to_vec2::<f32>()?;

    for (g, e) in got[0].iter().zip(expected[0].iter()) {
        assert!((g - e).abs() < 1e-6);
    }
    Ok(())
}

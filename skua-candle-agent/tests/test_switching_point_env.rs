mod common;

use anyhow::Result;
use candle_core::{Device, Tensor};
use common::{init_logger, PointEnv};
use skua_candle_agent::{
    mlp::MlpConfig,
    model::ModelConfig,
    ppo::PpoConfig,
    switching::{GateThresholds, SwitchedPpo, SwitchedPpoConfig},
    Activation,
};
use skua_core::Env;

const HORIZON: usize = 20;
const EPOCH_BATCH_SIZE: usize = 200;
const LR: f64 = 3e-3;

fn config() -> SwitchedPpoConfig {
    let net = MlpConfig::new(1, vec![16], 1, Activation::Linear);
    let mut ppo_config = PpoConfig::default()
        .policy_config(ModelConfig::default().net_config(net.clone()).learning_rate(LR))
        .value_config(ModelConfig::default().net_config(net.clone()).learning_rate(LR))
        .action_std(0.3)
        .epoch_batch_size(EPOCH_BATCH_SIZE)
        .max_ep_steps(HORIZON)
        .total_steps(600)
        .seed(42);
    ppo_config.policy_batch_size = 64;
    ppo_config.value_batch_size = 64;
    ppo_config.p_epochs = 3;
    ppo_config.v_epochs = 3;

    let mut config = SwitchedPpoConfig::default()
        .ppo_config(ppo_config)
        .gate_config(ModelConfig::default().net_config(net).learning_rate(LR))
        .gate_thresholds(GateThresholds::Hysteresis {
            lower: 0.3,
            upper: 0.7,
        })
        .hold_count(1);
    config.gate_batch_size = 64;
    config.g_epochs = 2;
    config
}

#[test]
fn switched_ppo_point_env_runs() -> Result<()> {
    init_logger();
    let mut env = PointEnv::new(HORIZON);

    // A stabilizing nominal controller the gate can fall back to.
    let nominal = Box::new(|obs: &[f32]| vec![-obs[0]]);
    let trainer = SwitchedPpo::build(config(), 1, &env.action_space(), nominal)?;
    let out = trainer.train(&mut env)?;

    assert_eq!(out.rew_hist.len(), 3);
    assert!(out.rew_hist.iter().all(|r| r.is_finite()));
    assert!(!out.early_stop);

    // The trained gate must emit finite logits.
    let obs = Tensor::from_slice(&[0.5f32], (1, 1), &Device::Cpu)?;
    let logit = out.gate_fn.forward(&obs).to_vec2::<f32>()?;
    assert!(logit[0][0].is_finite());

    Ok(())
}

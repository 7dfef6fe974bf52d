mod common;

use anyhow::Result;
use candle_core::{Device, Tensor};
use common::{init_logger, PointEnv};
use skua_candle_agent::{
    mlp::MlpConfig,
    model::ModelConfig,
    ppo::{Ppo, PpoConfig},
    Activation,
};
use skua_core::Env;

const HORIZON: usize = 20;
const EPOCH_BATCH_SIZE: usize = 200;
const MINIBATCH_SIZE: usize = 64;
const LR: f64 = 3e-3;

fn config(reward_stop: Option<f32>, total_steps: usize) -> PpoConfig {
    let net = MlpConfig::new(1, vec![16], 1, Activation::Linear);
    let mut config = PpoConfig::default()
        .policy_config(ModelConfig::default().net_config(net.clone()).learning_rate(LR))
        .value_config(ModelConfig::default().net_config(net).learning_rate(LR))
        .action_std(0.3)
        .epoch_batch_size(EPOCH_BATCH_SIZE)
        .max_ep_steps(HORIZON)
        .total_steps(total_steps)
        .seed(42);
    config.policy_batch_size = MINIBATCH_SIZE;
    config.value_batch_size = MINIBATCH_SIZE;
    config.p_epochs = 3;
    config.v_epochs = 3;
    config.reward_stop = reward_stop;
    config
}

#[test]
fn ppo_point_env_rewards_stay_finite() -> Result<()> {
    init_logger();
    let mut env = PointEnv::new(HORIZON);
    let ppo = Ppo::build(config(None, 2000), 1, &env.action_space())?;
    let out = ppo.train(&mut env)?;

    assert!(out.rew_hist.len() >= 2);
    assert!(out.rew_hist.iter().all(|r| r.is_finite()));
    assert!(!out.early_stop);

    // Within stochastic tolerance the run must not degrade; episode
    // rewards are bounded in [-HORIZON, 0] by construction.
    let first = out.rew_hist[0];
    let last = *out.rew_hist.last().unwrap();
    assert!(last >= first - 5.0, "first {}, last {}", first, last);

    // The trained policy must emit finite actions.
    let obs = Tensor::from_slice(&[1.0f32], (1, 1), &Device::Cpu)?;
    let act = out.policy.forward(&obs).to_vec2::<f32>()?;
    assert!(act[0][0].is_finite());

    Ok(())
}

#[test]
fn ppo_point_env_early_stops_on_reward_threshold() -> Result<()> {
    init_logger();
    let mut env = PointEnv::new(HORIZON);

    // Every batch reward exceeds this threshold, so the run must stop
    // right after the second batch.
    let ppo = Ppo::build(config(Some(-30.0), 100_000), 1, &env.action_space())?;
    let out = ppo.train(&mut env)?;

    assert!(out.early_stop);
    assert_eq!(out.rew_hist.len(), 2);

    Ok(())
}

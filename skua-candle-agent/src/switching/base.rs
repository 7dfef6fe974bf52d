use super::{
    gate::{ActionHold, GateState},
    SwitchedPpoConfig,
};
use crate::{
    mlp::Mlp,
    model::Model1,
    ppo::{OnPolicyBatch, Ppo},
    util::{gather_rows, rows_to_tensor},
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::loss::binary_cross_entropy_with_logit;
use log::{info, trace};
use rand::seq::SliceRandom;
use skua_core::{
    record::{Record, RecordValue},
    ActionSpace, Env, StochasticPolicy,
};

/// Externally supplied control law, a pure function of the observation.
pub type NominalController = Box<dyn Fn(&[f32]) -> Vec<f32>>;

/// Repeats the wrapped policy's actions through an [`ActionHold`].
///
/// Decouples the decision frequency from the environment step without
/// changing the environment's timestep; usable with any policy.
pub struct HeldPolicy<P> {
    inner: P,
    hold: ActionHold,
}

impl<P> HeldPolicy<P> {
    /// Wraps `inner` so each sampled action is repeated for `hold_count`
    /// extra steps.
    pub fn new(inner: P, hold_count: usize) -> Self {
        Self {
            inner,
            hold: ActionHold::new(hold_count),
        }
    }
}

impl<P: StochasticPolicy> StochasticPolicy for HeldPolicy<P> {
    fn sample(&mut self, obs: &[f32]) -> Vec<f32> {
        let inner = &mut self.inner;
        self.hold.step(|| inner.sample(obs))
    }
}

/// Per-step controller composing the learned actor, the nominal control
/// law and the gate.
///
/// On each decision the gate's sigmoid output is fed to the path
/// selector; the learned path samples the Gaussian actor, the nominal
/// path calls the external control law. An optional action hold repeats
/// the selected action between decisions. The path taken is recorded per
/// environment step as the label stream for the gate update.
struct SwitchedPolicy<'a> {
    pi: &'a Model1<Mlp>,
    gate: &'a Model1<Mlp>,
    nominal: &'a dyn Fn(&[f32]) -> Vec<f32>,
    std: f64,
    gate_state: GateState,
    hold: Option<ActionHold>,
    paths: Vec<f32>,
    device: Device,
}

impl StochasticPolicy for SwitchedPolicy<'_> {
    fn sample(&mut self, obs: &[f32]) -> Vec<f32> {
        let Self {
            pi,
            gate,
            nominal,
            std,
            gate_state,
            hold,
            paths,
            device,
        } = self;

        let mut decide = || {
            let obs_t = Tensor::from_slice(obs, (1, obs.len()), device).unwrap();
            let logit = gate
                .forward(&obs_t)
                .flatten_all()
                .unwrap()
                .to_vec1::<f32>()
                .unwrap()[0];
            let p = 1.0 / (1.0 + (-logit).exp());
            if gate_state.decide(p) {
                let mean = pi.forward(&obs_t);
                let act = ((mean.randn_like(0.0, 1.0).unwrap() * *std).unwrap() + mean).unwrap();
                act.flatten_all().unwrap().to_vec1::<f32>().unwrap()
            } else {
                (nominal)(obs)
            }
        };

        let act = match hold {
            Some(h) => h.step(&mut decide),
            None => decide(),
        };

        // Held steps carry the label of the decision they repeat.
        paths.push(if gate_state.on_learned_path() { 1.0 } else { 0.0 });
        act
    }
}

/// Output of a switched PPO run.
pub struct SwitchedPpoOutput {
    /// Trained policy network.
    pub policy: Model1<Mlp>,

    /// Trained value network.
    pub value_fn: Model1<Mlp>,

    /// Trained gate network, emitting path logits.
    pub gate_fn: Model1<Mlp>,

    /// Per-batch reward history.
    pub rew_hist: Vec<f32>,

    /// Whether the run stopped on the reward threshold.
    pub early_stop: bool,
}

/// PPO variant that gates between the learned policy and a nominal
/// controller.
///
/// Collection runs through the switched controller; policy updates are
/// restricted to the steps the learned path produced, the value update
/// sees the whole batch, and an extra stage per iteration trains the
/// gate as a binary classifier against the historical path labels.
pub struct SwitchedPpo {
    ppo: Ppo,
    gate: Model1<Mlp>,
    nominal: NominalController,

    thresholds: super::GateThresholds,
    hold_count: Option<usize>,
    gate_batch_size: usize,
    g_epochs: usize,
}

impl SwitchedPpo {
    /// Constructs the trainer.
    ///
    /// The gate network must end in a linear layer of width one; its
    /// output is read as a logit.
    pub fn build(
        config: SwitchedPpoConfig,
        obs_dim: usize,
        action_space: &ActionSpace,
        nominal: NominalController,
    ) -> Result<Self> {
        config.validate()?;
        let ppo = Ppo::build(config.ppo_config, obs_dim, action_space)?;
        let gate = Model1::<Mlp>::build(config.gate_config, ppo.device.clone())?;

        Ok(Self {
            ppo,
            gate,
            nominal,
            thresholds: config.gate_thresholds,
            hold_count: config.hold_count,
            gate_batch_size: config.gate_batch_size,
            g_epochs: config.g_epochs,
        })
    }

    /// Collects trajectories with the switched controller, carrying the
    /// path labels alongside the advantage slices.
    fn collect<E: Env>(&mut self, env: &mut E) -> Result<OnPolicyBatch> {
        let mut batch = OnPolicyBatch::new(self.ppo.obs_dim, self.ppo.act_dim);
        let mut ep_rewards = vec![];
        self.ppo.state.begin_batch();

        while self.ppo.state.cur_batch_steps < self.ppo.epoch_batch_size {
            let (traj, paths) = {
                let mut policy = SwitchedPolicy {
                    pi: &self.ppo.pi,
                    gate: &self.gate,
                    nominal: &*self.nominal,
                    std: self.ppo.action_std,
                    gate_state: GateState::new(self.thresholds),
                    hold: self.hold_count.map(ActionHold::new),
                    paths: vec![],
                    device: self.ppo.device.clone(),
                };
                let traj = self.ppo.sampler.rollout(env, &mut policy)?;
                (traj, policy.paths)
            };

            if traj.is_degenerate() {
                trace!("discarding degenerate trajectory of length {}", traj.len());
                continue;
            }

            let t = traj.len();
            self.ppo.state.add_steps(t);
            ep_rewards.push(traj.total_reward());
            self.ppo.append_trajectory(&mut batch, &traj);
            batch.paths.extend_from_slice(&paths[..t - 1]);
        }

        let batch_reward = ep_rewards.iter().sum::<f32>() / ep_rewards.len() as f32;
        self.ppo.state.record_batch_reward(batch_reward);

        Ok(batch)
    }

    /// Binary cross-entropy gate updates against the path labels, over
    /// shuffled minibatches.
    fn update_gate(&mut self, batch: &OnPolicyBatch) -> Result<f32> {
        let mut last_loss = 0f32;
        let mut ixs: Vec<usize> = (0..batch.len()).collect();

        for _ in 0..self.g_epochs {
            ixs.shuffle(&mut self.ppo.rng);
            for chunk in ixs.chunks(self.gate_batch_size) {
                let m = chunk.len();
                let obs = rows_to_tensor(
                    &gather_rows(&batch.obs, batch.obs_dim, chunk),
                    m,
                    batch.obs_dim,
                    &self.ppo.device,
                )?;
                let labels = Tensor::from_slice(
                    &chunk.iter().map(|&i| batch.paths[i]).collect::<Vec<f32>>(),
                    (m,),
                    &self.ppo.device,
                )?;

                let logits = self.gate.forward(&obs).squeeze(D::Minus1)?;
                let loss = binary_cross_entropy_with_logit(&logits, &labels)?;
                self.gate.backward_step(&loss)?;
                last_loss = loss.to_scalar::<f32>()?;
            }
        }

        Ok(last_loss)
    }

    /// Runs the training loop to the step ceiling or the early-stop rule
    /// and returns the trained bundle.
    pub fn train<E: Env>(mut self, env: &mut E) -> Result<SwitchedPpoOutput> {
        let mut epoch = 0usize;
        while self.ppo.state.cur_total_steps < self.ppo.total_steps {
            if self.ppo.state.should_stop(self.ppo.reward_stop) {
                break;
            }

            let batch = self.collect(env)?;
            let learned_rows: Vec<usize> = batch
                .paths
                .iter()
                .enumerate()
                .filter(|&(_, &p)| p > 0.5)
                .map(|(i, _)| i)
                .collect();
            let learned_frac = learned_rows.len() as f32 / batch.len() as f32;

            let loss_policy = self.ppo.update_policy(&batch, Some(&learned_rows))?;
            let loss_value = self.ppo.update_value(&batch)?;
            let loss_gate = self.update_gate(&batch)?;
            self.ppo.refresh_old_policy();

            let record = Record::from_slice(&[
                (
                    "batch_reward",
                    RecordValue::Scalar(*self.ppo.state.rew_hist.last().unwrap()),
                ),
                ("learned_frac", RecordValue::Scalar(learned_frac)),
                ("loss_policy", RecordValue::Scalar(loss_policy)),
                ("loss_value", RecordValue::Scalar(loss_value)),
                ("loss_gate", RecordValue::Scalar(loss_gate)),
            ]);
            info!(
                "epoch {}: steps {}, batch_reward {:.3}, learned_frac {:.2}",
                epoch,
                self.ppo.state.cur_total_steps,
                record.get_scalar("batch_reward").unwrap(),
                record.get_scalar("learned_frac").unwrap(),
            );
            epoch += 1;
        }

        Ok(SwitchedPpoOutput {
            policy: self.ppo.pi,
            value_fn: self.ppo.value_fn,
            gate_fn: self.gate,
            rew_hist: self.ppo.state.rew_hist,
            early_stop: self.ppo.state.early_stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingPolicy {
        calls: usize,
    }

    impl StochasticPolicy for CountingPolicy {
        fn sample(&mut self, _obs: &[f32]) -> Vec<f32> {
            self.calls += 1;
            vec![self.calls as f32]
        }
    }

    #[test]
    fn held_policy_reduces_inner_calls() {
        let mut policy = HeldPolicy::new(CountingPolicy { calls: 0 }, 3);
        let acts: Vec<f32> = (0..8).map(|_| policy.sample(&[0.0])[0]).collect();

        // One inner call per four steps.
        assert_eq!(acts, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        assert_eq!(policy.inner.calls, 2);
    }
}

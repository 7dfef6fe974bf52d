use super::PpoConfig;
use crate::{
    mlp::Mlp,
    model::Model1,
    util::{gather_rows, rows_to_tensor},
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use log::{info, trace};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use skua_core::{
    discount_cumsum, gae,
    record::{Record, RecordValue},
    ActionSpace, Env, Sampler, StochasticPolicy, TrainingState, Trajectory,
};

/// Negated clipped surrogate, `-mean(min(r*adv, clamp(r, lo, hi)*adv))`.
///
/// The clip bounds the objective even when the ratio estimate is far
/// from one.
fn surrogate_loss(ratio: &Tensor, adv: &Tensor, lo: f64, hi: f64) -> Result<Tensor> {
    let clipped = ratio.clamp(lo, hi)?;
    let surr = (ratio * adv)?.minimum(&(&clipped * adv)?)?;
    Ok(surr.mean_all()?.neg()?)
}

/// Gaussian policy with a fixed standard deviation over an MLP mean.
///
/// Used to drive rollouts; log-probabilities for the surrogate objective
/// are computed by the trainer on whole minibatches.
pub(crate) struct GaussMeanPolicy<'a> {
    pub pi: &'a Model1<Mlp>,
    pub std: f64,
    pub device: Device,
}

impl StochasticPolicy for GaussMeanPolicy<'_> {
    fn sample(&mut self, obs: &[f32]) -> Vec<f32> {
        let obs = Tensor::from_slice(obs, (1, obs.len()), &self.device).unwrap();
        let mean = self.pi.forward(&obs);
        let act = ((mean.randn_like(0.0, 1.0).unwrap() * self.std).unwrap() + mean).unwrap();
        act.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }
}

/// Concatenated (state, action, advantage, return) slices of one batch of
/// trajectories, each trajectory's final dangling step excluded.
pub(crate) struct OnPolicyBatch {
    pub obs: Vec<f32>,
    pub act: Vec<f32>,
    pub adv: Vec<f32>,
    pub ret: Vec<f32>,
    pub obs_dim: usize,
    pub act_dim: usize,

    /// Per-step path labels (`1.0` = learned path), switching variant only.
    pub paths: Vec<f32>,
}

impl OnPolicyBatch {
    pub fn new(obs_dim: usize, act_dim: usize) -> Self {
        Self {
            obs: vec![],
            act: vec![],
            adv: vec![],
            ret: vec![],
            obs_dim,
            act_dim,
            paths: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.adv.len()
    }
}

/// Output of a PPO run: the trained bundle, the reward history and the
/// early-stop flag.
pub struct PpoOutput {
    /// Trained policy network.
    pub policy: Model1<Mlp>,

    /// Trained value network.
    pub value_fn: Model1<Mlp>,

    /// Per-batch reward history.
    pub rew_hist: Vec<f32>,

    /// Whether the run stopped on the reward threshold.
    pub early_stop: bool,
}

/// Proximal policy optimization trainer.
///
/// Per outer iteration: collect trajectories with the current policy,
/// estimate advantages, run clipped-surrogate policy updates against a
/// frozen snapshot of the pre-update policy, then regress the value
/// network on the discounted returns.
pub struct Ppo {
    pub(crate) pi: Model1<Mlp>,
    pub(crate) pi_old: Model1<Mlp>,
    pub(crate) value_fn: Model1<Mlp>,

    pub(crate) gamma: f32,
    pub(crate) lam: f32,
    pub(crate) eps: f32,
    pub(crate) action_std: f64,
    pub(crate) epoch_batch_size: usize,
    pub(crate) policy_batch_size: usize,
    pub(crate) value_batch_size: usize,
    pub(crate) p_epochs: usize,
    pub(crate) v_epochs: usize,
    pub(crate) total_steps: usize,
    pub(crate) reward_stop: Option<f32>,

    pub(crate) obs_dim: usize,
    pub(crate) act_dim: usize,
    pub(crate) sampler: Sampler,
    pub(crate) state: TrainingState,
    pub(crate) rng: StdRng,
    pub(crate) device: Device,
}

impl Ppo {
    /// Constructs the trainer for an environment with the given spaces.
    ///
    /// Fails before any environment interaction on out-of-range
    /// hyper-parameters or an action space the engine cannot drive.
    pub fn build(config: PpoConfig, obs_dim: usize, action_space: &ActionSpace) -> Result<Self> {
        config.validate()?;
        Sampler::check_action_space(action_space)?;

        let device: Device = config.device.unwrap_or(crate::Device::Cpu).into();
        let pi = Model1::<Mlp>::build(config.policy_config.clone(), device.clone())?;
        let pi_old = pi.clone();
        let value_fn = Model1::<Mlp>::build(config.value_config, device.clone())?;

        Ok(Self {
            pi,
            pi_old,
            value_fn,
            gamma: config.gamma,
            lam: config.lam,
            eps: config.eps,
            action_std: config.action_std,
            epoch_batch_size: config.epoch_batch_size,
            policy_batch_size: config.policy_batch_size,
            value_batch_size: config.value_batch_size,
            p_epochs: config.p_epochs,
            v_epochs: config.v_epochs,
            total_steps: config.total_steps,
            reward_stop: config.reward_stop,
            obs_dim,
            act_dim: action_space.act_len(),
            sampler: Sampler::new(config.max_ep_steps),
            state: TrainingState::new(),
            rng: StdRng::seed_from_u64(config.seed),
            device,
        })
    }

    /// Appends one trajectory's (state, action, advantage, return) slices
    /// to the batch, dropping the final dangling step.
    pub(crate) fn append_trajectory(&self, batch: &mut OnPolicyBatch, traj: &Trajectory) {
        let t = traj.len();
        let rewards = traj.rewards();

        let mut obs = Vec::with_capacity(t * self.obs_dim);
        for tr in traj.steps() {
            obs.extend_from_slice(&tr.obs);
        }
        let values = {
            let obs = rows_to_tensor(&obs, t, self.obs_dim, &self.device).unwrap();
            self.value_fn
                .forward(&obs)
                .squeeze(D::Minus1)
                .unwrap()
                .to_vec1::<f32>()
                .unwrap()
        };

        let ret = discount_cumsum(&rewards, self.gamma);
        let adv = gae(&rewards, &values, self.gamma, self.lam);

        batch.obs.extend_from_slice(&obs[..(t - 1) * self.obs_dim]);
        for tr in traj.steps().iter().take(t - 1) {
            batch.act.extend_from_slice(&tr.act);
        }
        batch.adv.extend_from_slice(&adv);
        batch.ret.extend_from_slice(&ret[..t - 1]);
    }

    /// Collects trajectories until the batch holds `epoch_batch_size`
    /// steps, discarding degenerate single-step episodes.
    fn collect<E: Env>(&mut self, env: &mut E) -> Result<OnPolicyBatch> {
        let mut batch = OnPolicyBatch::new(self.obs_dim, self.act_dim);
        let mut ep_rewards = vec![];
        self.state.begin_batch();

        while self.state.cur_batch_steps < self.epoch_batch_size {
            let traj = {
                let mut policy = GaussMeanPolicy {
                    pi: &self.pi,
                    std: self.action_std,
                    device: self.device.clone(),
                };
                self.sampler.rollout(env, &mut policy)?
            };

            if traj.is_degenerate() {
                trace!("discarding degenerate trajectory of length {}", traj.len());
                continue;
            }

            self.state.add_steps(traj.len());
            ep_rewards.push(traj.total_reward());
            self.append_trajectory(&mut batch, &traj);
        }

        let batch_reward = ep_rewards.iter().sum::<f32>() / ep_rewards.len() as f32;
        self.state.record_batch_reward(batch_reward);

        Ok(batch)
    }

    /// Log-probability of `act` under the Gaussian with means
    /// `pi(obs)` and the trainer's fixed standard deviation.
    fn logp(pi: &Model1<Mlp>, std: f64, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let mean = pi.forward(obs);
        let c = -0.5 * (2.0 * std::f64::consts::PI).ln() - std.ln();
        let z = ((act - &mean)? / std)?;
        Ok((c - (0.5 * z.powf(2.0)?)?)?.sum(D::Minus1)?)
    }

    /// Clipped-surrogate policy updates over shuffled minibatches.
    ///
    /// `rows` restricts the update to a subset of the batch (the
    /// switching variant trains the policy on learned-path steps only).
    pub(crate) fn update_policy(
        &mut self,
        batch: &OnPolicyBatch,
        rows: Option<&[usize]>,
    ) -> Result<f32> {
        let all_rows: Vec<usize>;
        let rows = match rows {
            Some(rows) => rows,
            None => {
                all_rows = (0..batch.len()).collect();
                &all_rows
            }
        };
        if rows.is_empty() {
            return Ok(0.0);
        }

        let lo = (1.0 - self.eps) as f64;
        let hi = (1.0 + self.eps) as f64;
        let mut last_loss = 0f32;
        let mut ixs = rows.to_vec();

        for _ in 0..self.p_epochs {
            ixs.shuffle(&mut self.rng);
            for chunk in ixs.chunks(self.policy_batch_size) {
                let m = chunk.len();
                let obs = rows_to_tensor(
                    &gather_rows(&batch.obs, batch.obs_dim, chunk),
                    m,
                    batch.obs_dim,
                    &self.device,
                )?;
                let act = rows_to_tensor(
                    &gather_rows(&batch.act, batch.act_dim, chunk),
                    m,
                    batch.act_dim,
                    &self.device,
                )?;
                let adv = Tensor::from_slice(
                    &chunk.iter().map(|&i| batch.adv[i]).collect::<Vec<f32>>(),
                    (m,),
                    &self.device,
                )?;

                let logp_new = Self::logp(&self.pi, self.action_std, &obs, &act)?;
                let logp_old = Self::logp(&self.pi_old, self.action_std, &obs, &act)?.detach();
                let ratio = (logp_new - logp_old)?.exp()?;
                let loss = surrogate_loss(&ratio, &adv, lo, hi)?;

                self.pi.backward_step(&loss)?;
                last_loss = loss.to_scalar::<f32>()?;
            }
        }

        Ok(last_loss)
    }

    /// Value regression toward the discounted returns.
    pub(crate) fn update_value(&mut self, batch: &OnPolicyBatch) -> Result<f32> {
        let mut last_loss = 0f32;
        let mut ixs: Vec<usize> = (0..batch.len()).collect();

        for _ in 0..self.v_epochs {
            ixs.shuffle(&mut self.rng);
            for chunk in ixs.chunks(self.value_batch_size) {
                let m = chunk.len();
                let obs = rows_to_tensor(
                    &gather_rows(&batch.obs, batch.obs_dim, chunk),
                    m,
                    batch.obs_dim,
                    &self.device,
                )?;
                let ret = Tensor::from_slice(
                    &chunk.iter().map(|&i| batch.ret[i]).collect::<Vec<f32>>(),
                    (m,),
                    &self.device,
                )?;

                let pred = self.value_fn.forward(&obs).squeeze(D::Minus1)?;
                let loss = mse(&pred, &ret)?;
                self.value_fn.backward_step(&loss)?;
                last_loss = loss.to_scalar::<f32>()?;
            }
        }

        Ok(last_loss)
    }

    /// Replaces the frozen snapshot with a fresh copy of the updated
    /// policy.
    pub(crate) fn refresh_old_policy(&mut self) {
        self.pi_old = self.pi.clone();
    }

    /// Runs the training loop to the step ceiling or the early-stop rule
    /// and returns the trained bundle.
    pub fn train<E: Env>(mut self, env: &mut E) -> Result<PpoOutput> {
        let mut epoch = 0usize;
        while self.state.cur_total_steps < self.total_steps {
            if self.state.should_stop(self.reward_stop) {
                break;
            }

            let batch = self.collect(env)?;
            let loss_policy = self.update_policy(&batch, None)?;
            let loss_value = self.update_value(&batch)?;
            self.refresh_old_policy();

            let record = Record::from_slice(&[
                ("batch_reward", RecordValue::Scalar(*self.state.rew_hist.last().unwrap())),
                ("loss_policy", RecordValue::Scalar(loss_policy)),
                ("loss_value", RecordValue::Scalar(loss_value)),
            ]);
            info!(
                "epoch {}: steps {}, batch_reward {:.3}",
                epoch,
                self.state.cur_total_steps,
                record.get_scalar("batch_reward").unwrap()
            );
            epoch += 1;
        }

        Ok(PpoOutput {
            policy: self.pi,
            value_fn: self.value_fn,
            rew_hist: self.state.rew_hist,
            early_stop: self.state.early_stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(vals: &[f32]) -> Tensor {
        Tensor::from_slice(vals, (vals.len(),), &Device::Cpu).unwrap()
    }

    fn loss(ratio: &[f32], adv: &[f32], eps: f32) -> f32 {
        let lo = (1.0 - eps) as f64;
        let hi = (1.0 + eps) as f64;
        surrogate_loss(&t(ratio), &t(adv), lo, hi)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap()
    }

    #[test]
    fn surrogate_caps_ratio_above_upper_clip() {
        // Positive advantage with the ratio past 1 + eps takes the
        // clipped branch, not the raw ratio branch.
        assert!((loss(&[2.0], &[1.0], 0.2) - (-1.2)).abs() < 1e-6);
        assert!((loss(&[10.0], &[3.0], 0.2) - (-3.6)).abs() < 1e-5);
    }

    #[test]
    fn surrogate_is_raw_ratio_inside_the_clip() {
        assert!((loss(&[1.1], &[1.0], 0.2) - (-1.1)).abs() < 1e-6);
        assert!((loss(&[0.9], &[-2.0], 0.2) - 1.8).abs() < 1e-6);
    }

    #[test]
    fn surrogate_caps_ratio_below_lower_clip_with_negative_advantage() {
        // min picks the clipped branch for a shrinking ratio and negative
        // advantage; the pessimistic bound is the point of the clip.
        assert!((loss(&[0.5], &[-1.0], 0.2) - 0.8).abs() < 1e-6);

        // Growing ratio with negative advantage stays unclipped.
        assert!((loss(&[2.0], &[-1.0], 0.2) - 2.0).abs() < 1e-6);
    }
}

use super::SacConfig;
use crate::{
    mlp::{GaussHeadMlp, Mlp},
    model::{Model1, Model2},
    util::{gather_rows, normal_logp, polyak_update, rows_to_tensor, squash_correction},
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use log::{info, trace};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use skua_core::{
    error::SkuaError,
    record::{Record, RecordValue},
    ActionSpace, Env, ReplayBuffer, Sampler, StochasticPolicy, TrainingState,
};

/// Squashed Gaussian policy used to drive rollouts.
///
/// Samples `tanh(mean + std * noise) * act_limit`, the reparameterized
/// form whose gradients the policy update flows through.
struct SquashedGaussPolicy<'a> {
    pi: &'a Model1<GaussHeadMlp>,
    act_limit: f64,
    min_lstd: f64,
    max_lstd: f64,
    device: Device,
}

impl StochasticPolicy for SquashedGaussPolicy<'_> {
    fn sample(&mut self, obs: &[f32]) -> Vec<f32> {
        let obs = Tensor::from_slice(obs, (1, obs.len()), &self.device).unwrap();
        let (mean, lstd) = self.pi.forward(&obs);
        let std = lstd.clamp(self.min_lstd, self.max_lstd).unwrap().exp().unwrap();
        let x = ((std * mean.randn_like(0.0, 1.0).unwrap()).unwrap() + mean).unwrap();
        let act = (x.tanh().unwrap() * self.act_limit).unwrap();
        act.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }
}

/// Output of a SAC run: the trained bundle, the reward history and the
/// early-stop flag.
pub struct SacOutput {
    /// Trained policy network.
    pub policy: Model1<GaussHeadMlp>,

    /// Trained value network.
    pub value_fn: Model1<Mlp>,

    /// First trained Q network.
    pub q1_fn: Model2<Mlp>,

    /// Second trained Q network.
    pub q2_fn: Model2<Mlp>,

    /// Per-batch reward history.
    pub rew_hist: Vec<f32>,

    /// Whether the run stopped on the reward threshold.
    pub early_stop: bool,
}

/// Soft actor critic trainer.
///
/// Per outer iteration: collect rollouts into the replay buffer, sample a
/// batch, regress both Q networks toward the bootstrapped target from the
/// polyak-averaged value copy, regress the value network toward the
/// entropy-regularized pessimistic estimate, update the policy over
/// freshly resampled actions and finally synchronize the target network.
pub struct Sac {
    pi: Model1<GaussHeadMlp>,
    value_fn: Model1<Mlp>,
    value_tgt: Model1<Mlp>,
    q1: Model2<Mlp>,
    q2: Model2<Mlp>,

    gamma: f64,
    polyak: f64,
    alpha: f64,
    epsilon: f64,
    act_limit: f64,
    min_lstd: f64,
    max_lstd: f64,
    epoch_batch_size: usize,
    replay_batch_size: usize,
    pol_batch_size: usize,
    val_batch_size: usize,
    q_batch_size: usize,
    total_steps: usize,
    reward_stop: Option<f32>,

    buffer: ReplayBuffer,
    sampler: Sampler,
    state: TrainingState,
    rng: StdRng,
    device: Device,
}

impl Sac {
    /// Constructs the trainer for an environment with the given spaces.
    ///
    /// The action space must be a continuous box symmetric around zero;
    /// anything else is a fatal configuration error.
    pub fn build(config: SacConfig, obs_dim: usize, action_space: &ActionSpace) -> Result<Self> {
        config.validate()?;
        Sampler::check_action_space(action_space)?;
        let (act_dim, act_limit) = match action_space {
            ActionSpace::Continuous { dim, low, high } if *low == -*high => {
                (*dim, *high as f64)
            }
            _ => {
                return Err(
                    SkuaError::UnsupportedActionSpace(format!("{:?}", action_space)).into(),
                )
            }
        };

        let device: Device = config.device.unwrap_or(crate::Device::Cpu).into();
        let pi = Model1::<GaussHeadMlp>::build(config.policy_config, device.clone())?;
        let value_fn = Model1::<Mlp>::build(config.value_config, device.clone())?;
        // Deep copy; the target never aliases the live value network.
        let value_tgt = value_fn.clone();
        let q1 = Model2::<Mlp>::build(config.q_config.clone(), device.clone())?;
        let q2 = Model2::<Mlp>::build(config.q_config, device.clone())?;

        Ok(Self {
            pi,
            value_fn,
            value_tgt,
            q1,
            q2,
            gamma: config.gamma,
            polyak: config.polyak,
            alpha: config.alpha,
            epsilon: config.epsilon,
            act_limit,
            min_lstd: config.min_lstd,
            max_lstd: config.max_lstd,
            epoch_batch_size: config.epoch_batch_size,
            replay_batch_size: config.replay_batch_size,
            pol_batch_size: config.pol_batch_size,
            val_batch_size: config.val_batch_size,
            q_batch_size: config.q_batch_size,
            total_steps: config.total_steps,
            reward_stop: config.reward_stop,
            buffer: ReplayBuffer::new(obs_dim, act_dim, config.replay_buf_size, config.seed)?,
            sampler: Sampler::new(config.max_ep_steps),
            state: TrainingState::new(),
            rng: StdRng::seed_from_u64(config.seed),
            device,
        })
    }

    /// Returns a reparameterized action and its log-probability.
    ///
    /// The log-probability carries the tanh Jacobian correction, floored
    /// by `epsilon` against saturation.
    fn action_logp(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, lstd) = self.pi.forward(obs);
        let lstd = lstd.clamp(self.min_lstd, self.max_lstd)?;
        let std = lstd.exp()?;
        let z = mean.randn_like(0.0, 1.0)?;
        let x = ((&std * &z)? + &mean)?;
        let a = x.tanh()?;
        let logp = (normal_logp(&z, &lstd)? - squash_correction(&a, self.epsilon)?)?;
        Ok(((a * self.act_limit)?, logp))
    }

    /// Pessimistic action value: elementwise minimum of the twin critics.
    fn q_min(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let q1 = self.q1.forward(obs, act).squeeze(D::Minus1)?;
        let q2 = self.q2.forward(obs, act).squeeze(D::Minus1)?;
        Ok(q1.minimum(&q2)?)
    }

    /// Collects rollouts until `epoch_batch_size` new steps are stored
    /// into the replay buffer.
    fn collect<E: Env>(&mut self, env: &mut E) -> Result<()> {
        let mut ep_rewards = vec![];
        self.state.begin_batch();

        while self.state.cur_batch_steps < self.epoch_batch_size {
            let traj = {
                let mut policy = SquashedGaussPolicy {
                    pi: &self.pi,
                    act_limit: self.act_limit,
                    min_lstd: self.min_lstd,
                    max_lstd: self.max_lstd,
                    device: self.device.clone(),
                };
                self.sampler.rollout(env, &mut policy)?
            };

            for tr in traj.steps() {
                self.buffer.store(tr);
            }
            self.state.add_steps(traj.len());
            ep_rewards.push(traj.total_reward());
        }

        let batch_reward = ep_rewards.iter().sum::<f32>() / ep_rewards.len() as f32;
        self.state.record_batch_reward(batch_reward);

        Ok(())
    }

    /// One optimization pass over a freshly sampled replay batch.
    ///
    /// Returns `(loss_q, loss_value, loss_policy)`.
    fn update(&mut self) -> Result<(f32, f32, f32)> {
        let batch = self.buffer.sample_batch(self.replay_batch_size)?;
        let n = batch.len();
        let obs1 = rows_to_tensor(&batch.obs1, n, batch.obs_dim, &self.device)?;
        let obs2 = rows_to_tensor(&batch.obs2, n, batch.obs_dim, &self.device)?;
        let act = rows_to_tensor(&batch.act, n, batch.act_dim, &self.device)?;
        let rew = Tensor::from_slice(&batch.rew, (n,), &self.device)?;
        let done = Tensor::from_slice(&batch.done, (n,), &self.device)?;

        // Bootstrapped Q target from the slow-moving value copy; treated
        // as a constant for the critic regression.
        let q_targ = {
            let v_next = self.value_tgt.forward(&obs2).squeeze(D::Minus1)?;
            let not_done = (1f64 - &done)?;
            ((&rew + (not_done * self.gamma)?.mul(&v_next)?)?).detach()
        };

        // Entropy-regularized value target from the pessimistic estimate
        // over the replayed actions and a freshly sampled log-probability.
        let v_targ = {
            let q_min = self.q_min(&obs1, &act)?;
            let (_, logp) = self.action_logp(&obs1)?;
            (q_min - (self.alpha * logp)?)?.detach()
        };

        let q_targ_v = q_targ.to_vec1::<f32>()?;
        let v_targ_v = v_targ.to_vec1::<f32>()?;

        let mut ixs: Vec<usize> = (0..n).collect();

        // Twin critics, optimized independently from the same batch.
        let mut loss_q = 0f32;
        ixs.shuffle(&mut self.rng);
        for chunk in ixs.chunks(self.q_batch_size) {
            let m = chunk.len();
            let obs = rows_to_tensor(
                &gather_rows(&batch.obs1, batch.obs_dim, chunk),
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
            let tgt = Tensor::from_slice(
                &chunk.iter().map(|&i| q_targ_v[i]).collect::<Vec<f32>>(),
                (m,),
                &self.device,
            )?;

            let pred1 = self.q1.forward(&obs, &act).squeeze(D::Minus1)?;
            let loss1 = mse(&pred1, &tgt)?;
            self.q1.backward_step(&loss1)?;

            let pred2 = self.q2.forward(&obs, &act).squeeze(D::Minus1)?;
            let loss2 = mse(&pred2, &tgt)?;
            self.q2.backward_step(&loss2)?;

            loss_q = 0.5 * (loss1.to_scalar::<f32>()? + loss2.to_scalar::<f32>()?);
        }

        // Value regression toward the entropy-regularized target.
        let mut loss_value = 0f32;
        ixs.shuffle(&mut self.rng);
        for chunk in ixs.chunks(self.val_batch_size) {
            let m = chunk.len();
            let obs = rows_to_tensor(
                &gather_rows(&batch.obs1, batch.obs_dim, chunk),
                m,
                batch.obs_dim,
                &self.device,
            )?;
            let tgt = Tensor::from_slice(
                &chunk.iter().map(|&i| v_targ_v[i]).collect::<Vec<f32>>(),
                (m,),
                &self.device,
            )?;

            let pred = self.value_fn.forward(&obs).squeeze(D::Minus1)?;
            let loss = mse(&pred, &tgt)?;
            self.value_fn.backward_step(&loss)?;
            loss_value = loss.to_scalar::<f32>()?;
        }

        // Policy update over freshly resampled actions; gradients flow
        // through the reparameterized sampling step.
        let mut loss_policy = 0f32;
        ixs.shuffle(&mut self.rng);
        for chunk in ixs.chunks(self.pol_batch_size) {
            let m = chunk.len();
            let obs = rows_to_tensor(
                &gather_rows(&batch.obs1, batch.obs_dim, chunk),
                m,
                batch.obs_dim,
                &self.device,
            )?;

            let (a, logp) = self.action_logp(&obs)?;
            let q_min = self.q_min(&obs, &a)?;
            let loss = ((self.alpha * logp)? - q_min)?.mean_all()?;
            self.pi.backward_step(&loss)?;
            loss_policy = loss.to_scalar::<f32>()?;
        }

        Ok((loss_q, loss_value, loss_policy))
    }

    /// Runs the training loop to the step ceiling or the early-stop rule
    /// and returns the trained bundle.
    pub fn train<E: Env>(mut self, env: &mut E) -> Result<SacOutput> {
        let mut epoch = 0usize;
        while self.state.cur_total_steps < self.total_steps {
            if self.state.should_stop(self.reward_stop) {
                break;
            }

            self.collect(env)?;
            let (loss_q, loss_value, loss_policy) = self.update()?;

            trace!("target sync");
            polyak_update(self.value_tgt.varmap(), self.value_fn.varmap(), self.polyak)?;

            let record = Record::from_slice(&[
                ("batch_reward", RecordValue::Scalar(*self.state.rew_hist.last().unwrap())),
                ("loss_q", RecordValue::Scalar(loss_q)),
                ("loss_value", RecordValue::Scalar(loss_value)),
                ("loss_policy", RecordValue::Scalar(loss_policy)),
            ]);
            info!(
                "epoch {}: steps {}, batch_reward {:.3}",
                epoch,
                self.state.cur_total_steps,
                record.get_scalar("batch_reward").unwrap()
            );
            epoch += 1;
        }

        Ok(SacOutput {
            policy: self.pi,
            value_fn: self.value_fn,
            q1_fn: self.q1,
            q2_fn: self.q2,
            rew_hist: self.state.rew_hist,
            early_stop: self.state.early_stop,
        })
    }
}

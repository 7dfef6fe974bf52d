//! Rollout collection.
use crate::{error::SkuaError, ActionSpace, Env, StochasticPolicy, Trajectory, Transition};
use anyhow::Result;
use log::trace;

/// Drives an environment with a policy to produce trajectories.
///
/// One call to [`Sampler::rollout`] produces one episode: observe, sample
/// an action from the policy's distribution, step the environment and
/// record the transition, until `done` or `max_steps`. The sampler has no
/// side effects beyond the environment's own state advancing.
pub struct Sampler {
    max_steps: usize,
}

impl Sampler {
    /// Constructs a sampler with an episode step ceiling.
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Checks that the environment's action space is one the trainers can
    /// drive.
    ///
    /// The gradient engines in this workspace handle continuous boxes
    /// only; anything else is a fatal configuration error, raised before
    /// any environment interaction.
    pub fn check_action_space(space: &ActionSpace) -> Result<()> {
        match space {
            ActionSpace::Continuous { dim, low, high } => {
                if *dim == 0 || !(low < high) {
                    Err(SkuaError::UnsupportedActionSpace(format!("{:?}", space)).into())
                } else {
                    Ok(())
                }
            }
            ActionSpace::Discrete { .. } => {
                Err(SkuaError::UnsupportedActionSpace(format!("{:?}", space)).into())
            }
        }
    }

    /// Collects a single trajectory.
    pub fn rollout<E, P>(&self, env: &mut E, policy: &mut P) -> Result<Trajectory>
    where
        E: Env,
        P: StochasticPolicy + ?Sized,
    {
        let mut traj = Trajectory::new();
        let mut obs = env.reset()?;

        for t in 0..self.max_steps {
            let act = policy.sample(&obs);
            let step = env.step(&act)?;
            traj.push(Transition {
                obs,
                act,
                reward: step.reward,
                next_obs: step.obs.clone(),
                done: step.done,
            });
            obs = step.obs;

            if step.done {
                trace!("episode terminated at step {}", t);
                break;
            }
        }

        Ok(traj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnvStep;

    struct CountEnv {
        t: usize,
        horizon: usize,
    }

    impl Env for CountEnv {
        fn reset(&mut self) -> Result<Vec<f32>> {
            self.t = 0;
            Ok(vec![0.0])
        }

        fn step(&mut self, _act: &[f32]) -> Result<EnvStep> {
            self.t += 1;
            Ok(EnvStep {
                obs: vec![self.t as f32],
                reward: 1.0,
                done: self.t >= self.horizon,
            })
        }

        fn action_space(&self) -> ActionSpace {
            ActionSpace::Continuous {
                dim: 1,
                low: -1.0,
                high: 1.0,
            }
        }

        fn obs_dim(&self) -> usize {
            1
        }
    }

    struct ZeroPolicy;

    impl StochasticPolicy for ZeroPolicy {
        fn sample(&mut self, _obs: &[f32]) -> Vec<f32> {
            vec![0.0]
        }
    }

    #[test]
    fn rollout_stops_on_done() {
        let mut env = CountEnv { t: 0, horizon: 3 };
        let traj = Sampler::new(100).rollout(&mut env, &mut ZeroPolicy).unwrap();
        assert_eq!(traj.len(), 3);
        assert!(traj.steps().last().unwrap().done);
        assert_eq!(traj.total_reward(), 3.0);
    }

    #[test]
    fn rollout_respects_step_ceiling() {
        let mut env = CountEnv { t: 0, horizon: 1000 };
        let traj = Sampler::new(5).rollout(&mut env, &mut ZeroPolicy).unwrap();
        assert_eq!(traj.len(), 5);
        assert!(!traj.steps().last().unwrap().done);
    }

    #[test]
    fn discrete_action_space_is_rejected() {
        let err = Sampler::check_action_space(&ActionSpace::Discrete { n: 4 }).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SkuaError>(),
            Some(SkuaError::UnsupportedActionSpace(_))
        ));
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let space = ActionSpace::Continuous {
            dim: 1,
            low: 1.0,
            high: 1.0,
        };
        assert!(Sampler::check_action_space(&space).is_err());
    }
}

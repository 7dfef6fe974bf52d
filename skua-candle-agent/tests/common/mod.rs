#![allow(dead_code)]
use anyhow::Result;
use skua_core::{ActionSpace, Env, EnvStep};

/// 1-D point-mass environment with contracting linear dynamics.
///
/// The state stays in `[-1, 1]` for any action sequence, so episode
/// rewards are bounded in `[-horizon, 0]` and the optimal behavior is to
/// push the state toward zero.
pub struct PointEnv {
    x: f32,
    t: usize,
    starts: [f32; 4],
    next_start: usize,
    horizon: usize,
}

impl PointEnv {
    pub fn new(horizon: usize) -> Self {
        Self {
            x: 0.0,
            t: 0,
            starts: [1.0, -1.0, 0.5, -0.5],
            next_start: 0,
            horizon,
        }
    }
}

impl Env for PointEnv {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.x = self.starts[self.next_start % self.starts.len()];
        self.next_start += 1;
        self.t = 0;
        Ok(vec![self.x])
    }

    fn step(&mut self, act: &[f32]) -> Result<EnvStep> {
        let a = act[0].clamp(-1.0, 1.0);
        self.x = 0.8 * self.x + 0.2 * a;
        self.t += 1;
        Ok(EnvStep {
            obs: vec![self.x],
            reward: -self.x * self.x,
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

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

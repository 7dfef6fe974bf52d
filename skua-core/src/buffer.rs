//! Replay buffer for off-policy learning.
use crate::{error::SkuaError, Transition};
use anyhow::Result;
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// A batch sampled from the replay buffer, as five parallel arrays.
///
/// Observation and action rows are flattened; `obs_dim` and `act_dim` give
/// the row widths.
#[derive(Debug)]
pub struct SampledBatch {
    /// Observations before the step, row-major `[n, obs_dim]`.
    pub obs1: Vec<f32>,

    /// Observations after the step, row-major `[n, obs_dim]`.
    pub obs2: Vec<f32>,

    /// Actions, row-major `[n, act_dim]`.
    pub act: Vec<f32>,

    /// Rewards.
    pub rew: Vec<f32>,

    /// Terminal flags, `0` or `1`.
    pub done: Vec<f32>,

    /// Width of an observation row.
    pub obs_dim: usize,

    /// Width of an action row.
    pub act_dim: usize,
}

impl SampledBatch {
    /// Number of sampled transitions.
    pub fn len(&self) -> usize {
        self.rew.len()
    }

    /// Returns `true` if the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.rew.is_empty()
    }
}

/// Fixed-capacity circular store of transitions.
///
/// The ring insertion pointer wraps around once the capacity is reached,
/// so the resident set is always the most recent `capacity` insertions.
/// Sampling draws uniformly with replacement across occupied slots only.
pub struct ReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    act_dim: usize,

    /// Ring insertion pointer.
    i: usize,

    /// Current number of stored transitions.
    size: usize,

    obs1: Vec<f32>,
    obs2: Vec<f32>,
    act: Vec<f32>,
    rew: Vec<f32>,
    done: Vec<f32>,

    rng: StdRng,
}

impl ReplayBuffer {
    /// Constructs a buffer for `capacity` transitions of the given widths.
    pub fn new(obs_dim: usize, act_dim: usize, capacity: usize, seed: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(SkuaError::invalid_config("capacity", capacity).into());
        }

        Ok(Self {
            capacity,
            obs_dim,
            act_dim,
            i: 0,
            size: 0,
            obs1: vec![0.; capacity * obs_dim],
            obs2: vec![0.; capacity * obs_dim],
            act: vec![0.; capacity * act_dim],
            rew: vec![0.; capacity],
            done: vec![0.; capacity],
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Current number of stored transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if no transition has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Stores a transition, overwriting the oldest entry once full.
    pub fn store(&mut self, tr: &Transition) {
        debug_assert_eq!(tr.obs.len(), self.obs_dim);
        debug_assert_eq!(tr.act.len(), self.act_dim);

        let o = self.i * self.obs_dim;
        self.obs1[o..o + self.obs_dim].copy_from_slice(&tr.obs);
        self.obs2[o..o + self.obs_dim].copy_from_slice(&tr.next_obs);
        let a = self.i * self.act_dim;
        self.act[a..a + self.act_dim].copy_from_slice(&tr.act);
        self.rew[self.i] = tr.reward;
        self.done[self.i] = tr.done as u8 as f32;

        self.i = (self.i + 1) % self.capacity;
        self.size += 1;
        if self.size >= self.capacity {
            self.size = self.capacity;
        }
    }

    /// Samples `n` transitions uniformly with replacement.
    ///
    /// `n` may exceed the current occupancy; duplicates are permitted.
    pub fn sample_batch(&mut self, n: usize) -> Result<SampledBatch> {
        if self.size == 0 {
            return Err(SkuaError::EmptyBuffer.into());
        }

        let ixs = (0..n)
            .map(|_| (self.rng.next_u32() as usize) % self.size)
            .collect::<Vec<_>>();

        let mut obs1 = Vec::with_capacity(n * self.obs_dim);
        let mut obs2 = Vec::with_capacity(n * self.obs_dim);
        let mut act = Vec::with_capacity(n * self.act_dim);
        for &ix in ixs.iter() {
            let o = ix * self.obs_dim;
            obs1.extend_from_slice(&self.obs1[o..o + self.obs_dim]);
            obs2.extend_from_slice(&self.obs2[o..o + self.obs_dim]);
            let a = ix * self.act_dim;
            act.extend_from_slice(&self.act[a..a + self.act_dim]);
        }

        Ok(SampledBatch {
            obs1,
            obs2,
            act,
            rew: ixs.iter().map(|&ix| self.rew[ix]).collect(),
            done: ixs.iter().map(|&ix| self.done[ix]).collect(),
            obs_dim: self.obs_dim,
            act_dim: self.act_dim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(v: f32) -> Transition {
        Transition {
            obs: vec![v, v],
            act: vec![-v],
            reward: v,
            next_obs: vec![v + 1.0, v + 1.0],
            done: false,
        }
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(ReplayBuffer::new(2, 1, 0, 0).is_err());
    }

    #[test]
    fn sampling_empty_buffer_fails() {
        let mut buf = ReplayBuffer::new(2, 1, 8, 0).unwrap();
        let err = buf.sample_batch(4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SkuaError>(),
            Some(SkuaError::EmptyBuffer)
        ));
    }

    #[test]
    fn fifo_eviction_keeps_latest_capacity_entries() {
        for k in 1..5usize {
            let capacity = 6;
            let mut buf = ReplayBuffer::new(2, 1, capacity, 0).unwrap();
            let total = capacity + k;
            for j in 0..total {
                buf.store(&tr(j as f32));
            }
            assert_eq!(buf.len(), capacity);

            // The resident rewards must be exactly the most recent
            // `capacity` insertions.
            let mut resident = buf.rew.clone();
            resident.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let expected: Vec<f32> = (k..total).map(|j| j as f32).collect();
            assert_eq!(resident, expected);
        }
    }

    #[test]
    fn batch_may_exceed_occupancy() {
        let mut buf = ReplayBuffer::new(2, 1, 8, 0).unwrap();
        buf.store(&tr(3.0));
        let batch = buf.sample_batch(5).unwrap();
        assert_eq!(batch.len(), 5);
        assert!(batch.rew.iter().all(|&r| r == 3.0));
        assert_eq!(batch.obs1.len(), 5 * 2);
        assert_eq!(batch.act.len(), 5);
    }
}

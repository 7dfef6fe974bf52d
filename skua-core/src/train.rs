//! Training-run bookkeeping.

/// Scalar counters and reward history for one training run.
///
/// Created at run start, mutated once per outer iteration and handed back
/// to the caller at run end as part of the trainer output.
#[derive(Debug, Default, Clone)]
pub struct TrainingState {
    /// Total environment steps taken so far.
    pub cur_total_steps: usize,

    /// Environment steps taken in the current batch.
    pub cur_batch_steps: usize,

    /// Per-batch reward history.
    pub rew_hist: Vec<f32>,

    /// Whether the run stopped on the reward threshold.
    pub early_stop: bool,
}

impl TrainingState {
    /// Creates a fresh state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new collection batch.
    pub fn begin_batch(&mut self) {
        self.cur_batch_steps = 0;
    }

    /// Accounts for `n` environment steps in the current batch.
    pub fn add_steps(&mut self, n: usize) {
        self.cur_batch_steps += n;
        self.cur_total_steps += n;
    }

    /// Appends a batch reward to the history.
    pub fn record_batch_reward(&mut self, reward: f32) {
        self.rew_hist.push(reward);
    }

    /// Returns `true` once the two most recent rewards both reach
    /// `reward_stop`, and marks the run as early-stopped.
    pub fn should_stop(&mut self, reward_stop: Option<f32>) -> bool {
        let reward_stop = match reward_stop {
            Some(v) => v,
            None => return false,
        };
        let n = self.rew_hist.len();
        if n >= 2 && self.rew_hist[n - 1] >= reward_stop && self.rew_hist[n - 2] >= reward_stop {
            self.early_stop = true;
        }
        self.early_stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_requires_two_consecutive_rewards_over_threshold() {
        let mut state = TrainingState::new();
        assert!(!state.should_stop(Some(10.0)));

        state.record_batch_reward(12.0);
        assert!(!state.should_stop(Some(10.0)));

        state.record_batch_reward(9.0);
        assert!(!state.should_stop(Some(10.0)));

        state.record_batch_reward(11.0);
        assert!(!state.should_stop(Some(10.0)));

        state.record_batch_reward(10.0);
        assert!(state.should_stop(Some(10.0)));
        assert!(state.early_stop);
    }

    #[test]
    fn no_threshold_never_stops() {
        let mut state = TrainingState::new();
        state.record_batch_reward(f32::MAX);
        state.record_batch_reward(f32::MAX);
        assert!(!state.should_stop(None));
        assert!(!state.early_stop);
    }

    #[test]
    fn step_counters() {
        let mut state = TrainingState::new();
        state.add_steps(100);
        state.begin_batch();
        state.add_steps(32);
        assert_eq!(state.cur_batch_steps, 32);
        assert_eq!(state.cur_total_steps, 132);
    }
}

//! Transitions and trajectories.

/// A transition `(o_t, a_t, r_t, o_t+1, done_t)`.
///
/// Immutable once recorded.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation before the step.
    pub obs: Vec<f32>,

    /// Action taken.
    pub act: Vec<f32>,

    /// Reward of the step.
    pub reward: f32,

    /// Observation after the step.
    pub next_obs: Vec<f32>,

    /// Terminal flag.
    pub done: bool,
}

/// An ordered sequence of transitions from a single episode.
///
/// Terminated by `done` or a step-count ceiling. Owned by the
/// [`Sampler`](crate::Sampler) until handed to a trainer.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    steps: Vec<Transition>,
}

impl Trajectory {
    /// Creates an empty trajectory.
    pub fn new() -> Self {
        Self { steps: vec![] }
    }

    /// Appends a transition.
    pub fn push(&mut self, tr: Transition) {
        self.steps.push(tr);
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the trajectory holds no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A trajectory of one step or less carries no valid advantage slice
    /// and is discarded by the on-policy trainer.
    pub fn is_degenerate(&self) -> bool {
        self.len() <= 1
    }

    /// The recorded transitions.
    pub fn steps(&self) -> &[Transition] {
        &self.steps
    }

    /// Per-step rewards.
    pub fn rewards(&self) -> Vec<f32> {
        self.steps.iter().map(|tr| tr.reward).collect()
    }

    /// Sum of rewards over the episode.
    pub fn total_reward(&self) -> f32 {
        self.steps.iter().map(|tr| tr.reward).sum()
    }
}

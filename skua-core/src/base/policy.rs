//! Policy.

/// A stochastic policy on an environment.
///
/// A policy maps an observation to an action, sampled from the policy's
/// distribution. `sample` takes `&mut self` because some implementations
/// keep per-decision state (action hold, hysteresis).
pub trait StochasticPolicy {
    /// Samples an action given an observation.
    fn sample(&mut self, obs: &[f32]) -> Vec<f32>;
}

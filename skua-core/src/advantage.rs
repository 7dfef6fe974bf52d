//! Discounted returns and generalized advantage estimation.
//!
//! Both computations are single backward scans over one trajectory. No
//! normalization is applied here; that is the trainer's call.

/// Discounted cumulative sum of `rewards` with discount factor `discount`.
///
/// Computes `G_t = r_t + discount * G_{t+1}` with `G_T = 0`, which is the
/// reward-to-go used as the value-function regression target.
pub fn discount_cumsum(rewards: &[f32], discount: f32) -> Vec<f32> {
    let mut out = vec![0f32; rewards.len()];
    let mut future = 0f32;
    for i in (0..rewards.len()).rev() {
        future = rewards[i] + discount * future;
        out[i] = future;
    }
    out
}

/// Generalized advantage estimation.
///
/// Given per-step value predictions `values` (one per observation in the
/// trajectory), forms the TD residuals
/// `delta_t = r_t + gamma * V_{t+1} - V_t` and discounts them with decay
/// `gamma * lambda`. The final transition has no next-value bootstrap, so
/// the output length is `rewards.len() - 1`; fewer than two rewards yield
/// no residual at all.
pub fn gae(rewards: &[f32], values: &[f32], gamma: f32, lambda: f32) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), values.len());
    if rewards.len() < 2 {
        return vec![];
    }
    let deltas: Vec<f32> = (0..rewards.len() - 1)
        .map(|t| rewards[t] + gamma * values[t + 1] - values[t])
        .collect();
    discount_cumsum(&deltas, gamma * lambda)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_cumsum_matches_recurrence() {
        let g = discount_cumsum(&[1.0, 1.0, 1.0], 0.5);
        assert_eq!(g, vec![1.75, 1.5, 1.0]);
    }

    #[test]
    fn discount_cumsum_empty() {
        assert!(discount_cumsum(&[], 0.9).is_empty());
    }

    #[test]
    fn gae_with_zero_values_reduces_to_discounted_returns() {
        let rewards = [0.3f32, -1.2, 2.0, 0.7, 0.0, 1.1];
        let values = vec![0f32; rewards.len()];
        let adv = gae(&rewards, &values, 0.9, 1.0);
        let expected = discount_cumsum(&rewards[..rewards.len() - 1], 0.9);
        assert_eq!(adv.len(), rewards.len() - 1);
        for (a, e) in adv.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6);
        }
    }

    #[test]
    fn gae_of_short_trajectories_is_empty() {
        assert!(gae(&[], &[], 0.9, 0.95).is_empty());
        assert!(gae(&[1.0], &[0.5], 0.9, 0.95).is_empty());
    }

    #[test]
    fn gae_uses_next_value_bootstrap() {
        // Single delta: r_0 + gamma * V_1 - V_0.
        let adv = gae(&[1.0, 0.0], &[0.5, 2.0], 0.5, 0.95);
        assert_eq!(adv.len(), 1);
        assert!((adv[0] - (1.0 + 0.5 * 2.0 - 0.5)).abs() < 1e-6);
    }
}

//! Path selection and action-hold state machines.
use serde::{Deserialize, Serialize};

/// Threshold rule of the path selection.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub enum GateThresholds {
    /// One threshold; `p > threshold` selects the learned path.
    Single(f32),

    /// Two thresholds with a remembered prior path.
    ///
    /// The path flips to nominal only once `p` falls below `lower` and
    /// back to learned only once `p` rises above `upper`, so gate outputs
    /// wandering between the two never cause chattering.
    Hysteresis {
        /// Below this the learned path is left.
        lower: f32,

        /// Above this the learned path is entered.
        upper: f32,
    },
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self::Single(0.5)
    }
}

/// Path-selection state machine, advanced once per decision.
///
/// Starts on the nominal path.
#[derive(Clone, Debug)]
pub struct GateState {
    thresholds: GateThresholds,
    learned: bool,
}

impl GateState {
    /// Constructs the selector with the given threshold rule.
    pub fn new(thresholds: GateThresholds) -> Self {
        Self {
            thresholds,
            learned: false,
        }
    }

    /// Feeds one gate output `p` and returns `true` for the learned path.
    pub fn decide(&mut self, p: f32) -> bool {
        match self.thresholds {
            GateThresholds::Single(t) => {
                self.learned = p > t;
            }
            GateThresholds::Hysteresis { lower, upper } => {
                if self.learned && p < lower {
                    self.learned = false;
                } else if !self.learned && p > upper {
                    self.learned = true;
                }
            }
        }
        self.learned
    }

    /// Current path without advancing the machine.
    pub fn on_learned_path(&self) -> bool {
        self.learned
    }
}

/// Action-hold state machine.
///
/// States `Deciding` and `Holding`: every decision stores a fresh action
/// and moves to `Holding`; the stored action is then repeated verbatim
/// until the counter laps `hold_count`, at which point it resets and the
/// machine returns to `Deciding`. A `hold_count` of zero decides every
/// step.
#[derive(Clone, Debug)]
pub struct ActionHold {
    hold_count: usize,
    cur_hold_count: usize,
    held: Vec<f32>,
}

impl ActionHold {
    /// Constructs the machine in the `Deciding` state.
    pub fn new(hold_count: usize) -> Self {
        Self {
            hold_count,
            cur_hold_count: 0,
            held: vec![],
        }
    }

    /// Returns `true` when the next [`ActionHold::step`] will invoke its
    /// decision callback.
    pub fn is_deciding(&self) -> bool {
        self.cur_hold_count == 0
    }

    /// Runs one step.
    ///
    /// `decide` is invoked only in the `Deciding` state; otherwise the
    /// held action is returned unchanged.
    pub fn step(&mut self, decide: impl FnOnce() -> Vec<f32>) -> Vec<f32> {
        if self.cur_hold_count == 0 {
            self.held = decide();
        }
        self.cur_hold_count += 1;
        if self.cur_hold_count > self.hold_count {
            self.cur_hold_count = 0;
        }
        self.held.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_threshold_follows_gate_output() {
        let mut gate = GateState::new(GateThresholds::Single(0.5));
        assert!(!gate.on_learned_path());
        assert!(gate.decide(0.6));
        assert!(!gate.decide(0.4));
        assert!(!gate.decide(0.5));
    }

    #[test]
    fn hysteresis_does_not_chatter_between_thresholds() {
        let mut gate = GateState::new(GateThresholds::Hysteresis {
            lower: 0.3,
            upper: 0.7,
        });

        // Enter the learned path past the upper threshold.
        assert!(gate.decide(0.8));

        // Outputs between the thresholds never flip the path.
        for &p in &[0.65, 0.35, 0.5, 0.31, 0.69] {
            assert!(gate.decide(p));
        }

        // A crossing fully past the lower threshold flips it.
        assert!(!gate.decide(0.2));

        // And stays nominal between the thresholds.
        for &p in &[0.35, 0.65, 0.5] {
            assert!(!gate.decide(p));
        }

        // Back past the upper threshold.
        assert!(gate.decide(0.75));
    }

    #[test]
    fn hold_repeats_action_for_hold_count_steps() {
        let mut hold = ActionHold::new(2);
        let mut decisions = 0;

        // hold_count = 2 means each decision is executed for 3 steps.
        for step in 0..9 {
            let act = hold.step(|| {
                decisions += 1;
                vec![decisions as f32]
            });
            assert_eq!(act, vec![(step / 3 + 1) as f32]);
        }
        assert_eq!(decisions, 3);
    }

    #[test]
    fn zero_hold_count_decides_every_step() {
        let mut hold = ActionHold::new(0);
        for i in 0..4 {
            assert!(hold.is_deciding());
            let act = hold.step(|| vec![i as f32]);
            assert_eq!(act, vec![i as f32]);
        }
    }
}

//! Per-threshold evaluation cell.

use crate::prob::{
    self, LOG_DERIVATIVE_MINUS_INF, PROB_STEP, combine_disproof, prob_to_byte, tables,
};

/// What a node knows about the event "value >= threshold" for one odd threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    prob: u8,
    proof_number: f32,
    disproof_number: f32,
    max_log_derivative: i32,
}

impl Default for Evaluation {
    /// A cell that is certainly below its threshold.
    fn default() -> Self {
        Evaluation {
            prob: 0,
            proof_number: f32::INFINITY,
            disproof_number: 0.0,
            max_log_derivative: LOG_DERIVATIVE_MINUS_INF,
        }
    }
}

/// Leaf data needed to seed a cell from a heuristic estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafFeatures {
    /// Heuristic estimate in discs.
    pub estimate: f32,
    /// Confidence depth of the estimate.
    pub depth: u8,
    pub n_empties: u32,
    pub player_moves: u32,
    pub opponent_moves: u32,
}

impl Evaluation {
    /// Probability that the value is at least the threshold.
    #[inline]
    pub fn prob_greater_equal(&self) -> f64 {
        tables().byte_to_prob(self.prob)
    }

    /// Probability in byte scale.
    #[inline]
    pub fn prob_byte(&self) -> u8 {
        self.prob
    }

    /// `(1 - p)³`, used to scale the contention penalty.
    #[inline]
    pub fn prob_lower_cubed(&self) -> f64 {
        tables().prob_lower_cubed(self.prob)
    }

    /// Expected effort to prove "value >= threshold".
    #[inline]
    pub fn proof_number(&self) -> f32 {
        self.proof_number
    }

    /// Expected effort to prove "value < threshold".
    #[inline]
    pub fn disproof_number(&self) -> f32 {
        self.disproof_number
    }

    #[inline]
    pub fn max_log_derivative(&self) -> i32 {
        self.max_log_derivative
    }

    /// Checks whether the threshold is already decided either way.
    #[inline]
    pub fn is_solved(&self) -> bool {
        self.proof_number == 0.0 || self.disproof_number == 0.0
    }

    pub fn set_proved(&mut self) {
        self.prob = PROB_STEP;
        self.proof_number = 0.0;
        self.disproof_number = f32::INFINITY;
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    pub fn set_disproved(&mut self) {
        *self = Evaluation::default();
    }

    /// Seeds the cell of a leaf for threshold `goal` from its heuristic estimate.
    pub fn set_leaf(&mut self, goal: i32, leaf: &LeafFeatures) {
        let estimate = leaf.estimate as f64;
        let p = prob::leaf_win_probability(goal as f64, estimate, leaf.depth, leaf.n_empties);
        self.prob = prob_to_byte(p);
        let advantage = estimate - goal as f64;
        self.proof_number = if self.prob == 0 {
            f32::INFINITY
        } else {
            prob::leaf_proof_number(leaf.n_empties, leaf.opponent_moves, advantage)
        };
        self.disproof_number = if self.prob == PROB_STEP {
            f32::INFINITY
        } else {
            prob::leaf_disproof_number(leaf.n_empties, leaf.player_moves, advantage)
        };
        self.max_log_derivative = tables().leaf_log_derivative(self.prob);
    }

    /// Starts accumulating children into this cell.
    ///
    /// While accumulating, `prob` holds the probability that every child reaches
    /// the negated threshold, i.e. that the father stays below its threshold.
    pub fn initialize(&mut self) {
        self.prob = PROB_STEP;
        self.proof_number = f32::INFINITY;
        self.disproof_number = 0.0;
        self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
    }

    /// Accumulates the cell of one child at the negated threshold.
    pub fn update_father_with_child(&mut self, child: &Evaluation) {
        let t = tables();
        self.prob = t.combine(self.prob, child.prob);
        if child.prob != 0 && child.prob != PROB_STEP {
            let ld = child.max_log_derivative + t.log_derivative(child.prob);
            self.max_log_derivative = self.max_log_derivative.max(ld);
        }
        self.proof_number = self
            .proof_number
            .min(t.disproof_to_proof(child.disproof_number, child.prob));
        self.disproof_number = combine_disproof(self.disproof_number, child.proof_number);
    }

    /// Ends accumulation, turning the cell into the father's own view.
    pub fn finalize(&mut self) {
        if self.prob == 0 || self.prob == PROB_STEP {
            self.max_log_derivative = LOG_DERIVATIVE_MINUS_INF;
        } else {
            self.max_log_derivative -= tables().log_derivative(self.prob);
        }
        self.prob = PROB_STEP - self.prob;
        if self.prob == PROB_STEP {
            self.disproof_number = f32::INFINITY;
        }
        if self.prob == 0 {
            self.proof_number = f32::INFINITY;
        }
    }

    /// Sensitivity of `father` (at the negated threshold) to this child cell.
    pub fn log_derivative(&self, father: &Evaluation) -> i32 {
        if self.prob == 0 || self.prob == PROB_STEP || father.prob == 0 || father.prob == PROB_STEP
        {
            return LOG_DERIVATIVE_MINUS_INF;
        }
        let t = tables();
        self.max_log_derivative + t.log_derivative(self.prob)
            - t.log_derivative(PROB_STEP - father.prob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(estimate: f32) -> LeafFeatures {
        LeafFeatures {
            estimate,
            depth: 2,
            n_empties: 30,
            player_moves: 8,
            opponent_moves: 8,
        }
    }

    fn leaf_cell(goal: i32, estimate: f32) -> Evaluation {
        let mut eval = Evaluation::default();
        eval.set_leaf(goal, &leaf(estimate));
        eval
    }

    fn merge(children: &[Evaluation]) -> Evaluation {
        let mut father = Evaluation::default();
        father.initialize();
        for child in children {
            father.update_father_with_child(child);
        }
        father.finalize();
        father
    }

    #[test]
    fn test_leaf_consistency() {
        for goal in (-63..=63).step_by(2) {
            let eval = leaf_cell(goal, 10.0);
            let p = eval.prob_byte();
            assert_eq!(p == 0, eval.proof_number().is_infinite());
            assert_eq!(p == PROB_STEP, eval.disproof_number().is_infinite());
            assert_eq!(
                p == 0 || p == PROB_STEP,
                eval.max_log_derivative() == LOG_DERIVATIVE_MINUS_INF
            );
        }
    }

    #[test]
    fn test_single_child_negates() {
        let child = leaf_cell(-1, -6.0);
        let father = merge(&[child]);
        let expected = PROB_STEP - child.prob_byte();
        assert!((father.prob_byte() as i32 - expected as i32).abs() <= 1);
    }

    #[test]
    fn test_father_proved_by_one_disproved_child() {
        let mut refuted = Evaluation::default();
        refuted.set_disproved();
        let father = merge(&[leaf_cell(1, 0.0), refuted]);
        assert_eq!(father.prob_byte(), PROB_STEP);
        assert_eq!(father.proof_number(), 0.0);
        assert!(father.disproof_number().is_infinite());
        assert!(father.is_solved());
    }

    #[test]
    fn test_father_disproved_when_all_children_proved() {
        let mut proved = Evaluation::default();
        proved.set_proved();
        let father = merge(&[proved, proved]);
        assert_eq!(father.prob_byte(), 0);
        assert_eq!(father.disproof_number(), 0.0);
        assert!(father.proof_number().is_infinite());
    }

    #[test]
    fn test_more_children_help_the_father() {
        let child = leaf_cell(-1, 0.0);
        let one = merge(&[child]);
        let two = merge(&[child, child]);
        assert!(two.prob_byte() >= one.prob_byte());
        assert!(two.proof_number() <= one.proof_number());
        assert!(two.disproof_number() >= one.disproof_number());
    }

    #[test]
    fn test_log_derivative_prefers_uncertain_child() {
        let balanced = leaf_cell(-1, 0.0);
        let hopeless = leaf_cell(-1, 30.0);
        let father = merge(&[balanced, hopeless]);
        assert!(balanced.log_derivative(&father) > hopeless.log_derivative(&father));
    }

    #[test]
    fn test_log_derivative_of_decided_cells() {
        let mut proved = Evaluation::default();
        proved.set_proved();
        let father = merge(&[leaf_cell(1, 0.0)]);
        assert_eq!(proved.log_derivative(&father), LOG_DERIVATIVE_MINUS_INF);
    }
}

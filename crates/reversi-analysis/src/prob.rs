//! Probability scale, combiner tables and leaf estimates.
//!
//! A cell stores `P(value >= threshold)` as a byte. The byte scale is nonlinear and
//! spends most of its resolution close to 0 and 1, where the search makes its
//! decisions. Fathers combine child probabilities through a soft-min
//! `combine(x, y) = f⁻¹(f(x) + f(y))`, tabulated once per process for every byte pair.

use std::sync::OnceLock;

/// Number of steps of the probability byte scale.
pub const PROB_STEP: u8 = 255;

/// Log-derivative of a cell whose probability is exactly 0 or 1.
pub const LOG_DERIVATIVE_MINUS_INF: i32 = -1_000_000;

/// Largest finite proof or disproof number.
pub const MAX_PROOF_NUMBER: f32 = 1e25;

const LOG_DERIVATIVE_MULTIPLIER: f64 = 100.0;
const COMBINER_EXPONENT: f64 = 1.7;
const MIN_COMBINER_PROB: f64 = 1e-14;
const RESCALE_OFFSET: f64 = 10.0;
const RESCALE_EXPONENT: f64 = -3.5;
const BISECTION_STEPS: usize = 100;

/// Leaf estimates are never trusted to better than this many discs.
const MIN_LEAF_ERROR: f64 = 3.0;
/// Largest standard deviation of a leaf estimate, reached early in the midgame.
const PEAK_LEAF_ERROR: f64 = 8.5;
/// Number of empties at which leaf estimates are least reliable.
const PEAK_ERROR_EMPTIES: f64 = 14.0;

const LOG_PROOF_BASE: f64 = 1.0;
const LOG_PROOF_PER_EMPTY: f64 = 0.5;
const LOG_PROOF_PER_LOG_MOVE: f64 = 0.6;
const LOG_PROOF_PER_DISC: f64 = 0.12;

/// Process-wide lookup tables over the probability byte scale.
pub struct ProbTables {
    byte_to_prob: [f64; 256],
    combine: Box<[[u8; 256]]>,
    log_derivative: [i32; 256],
    leaf_log_derivative: [i32; 256],
    prob_lower_cubed: [f64; 256],
}

static TABLES: OnceLock<ProbTables> = OnceLock::new();

/// Returns the lookup tables, building them on first use.
#[inline]
pub fn tables() -> &'static ProbTables {
    TABLES.get_or_init(ProbTables::build)
}

impl ProbTables {
    fn build() -> Self {
        let mut byte_to_prob = [0.0; 256];
        for (i, p) in byte_to_prob.iter_mut().enumerate() {
            *p = match i {
                0 => 0.0,
                255 => 1.0,
                _ => inverse_rescale_prob(i as f64 / PROB_STEP as f64),
            };
        }

        // A combined probability rounds to byte b iff it lies in
        // [boundary[b - 1], boundary[b]); comparing in combiner space avoids
        // inverting the combiner for every pair.
        let boundaries: Vec<f64> = (0..255)
            .map(|k| combiner(inverse_rescale_prob((k as f64 + 0.5) / PROB_STEP as f64)))
            .collect();
        let combined: Vec<f64> = byte_to_prob.iter().map(|&p| combiner(p)).collect();
        let zero_threshold = combiner(MIN_COMBINER_PROB);

        let mut combine = vec![[0u8; 256]; 256].into_boxed_slice();
        for i in 0..256 {
            for j in 0..=i {
                let y = combined[i] + combined[j];
                let byte = if zero_threshold >= y {
                    0
                } else {
                    boundaries.partition_point(|&f| f <= y) as u8
                };
                let byte = byte.min(i as u8).min(j as u8);
                combine[i][j] = byte;
                combine[j][i] = byte;
            }
        }

        let mut log_derivative = [0; 256];
        let mut leaf_log_derivative = [0; 256];
        let mut prob_lower_cubed = [0.0; 256];
        for i in 0..256 {
            let p = byte_to_prob[i];
            log_derivative[i] = scaled_log(combiner_derivative(p));
            leaf_log_derivative[i] = if i == 0 || i == 255 {
                LOG_DERIVATIVE_MINUS_INF
            } else {
                scaled_log(p * (1.0 - p))
            };
            prob_lower_cubed[i] = (1.0 - p).powi(3);
        }

        ProbTables {
            byte_to_prob,
            combine,
            log_derivative,
            leaf_log_derivative,
            prob_lower_cubed,
        }
    }

    /// Converts a probability byte to a probability.
    #[inline]
    pub fn byte_to_prob(&self, b: u8) -> f64 {
        self.byte_to_prob[b as usize]
    }

    /// Probability that all of two independent events happen, in byte scale.
    #[inline]
    pub fn combine(&self, a: u8, b: u8) -> u8 {
        self.combine[a as usize][b as usize]
    }

    /// Scaled log of the combiner's derivative at the given probability.
    #[inline]
    pub fn log_derivative(&self, b: u8) -> i32 {
        self.log_derivative[b as usize]
    }

    /// Scaled log-derivative of a leaf with the given probability.
    #[inline]
    pub fn leaf_log_derivative(&self, b: u8) -> i32 {
        self.leaf_log_derivative[b as usize]
    }

    /// `(1 - p)³` for the given probability byte.
    #[inline]
    pub fn prob_lower_cubed(&self, b: u8) -> f64 {
        self.prob_lower_cubed[b as usize]
    }

    /// Converts a child's disproof number into a contribution to its father's proof number.
    ///
    /// A child that is likely to hold is expensive to refute, so the disproof number
    /// is inflated when the child's probability exceeds one half.
    pub fn disproof_to_proof(&self, disproof: f32, prob: u8) -> f32 {
        if prob == PROB_STEP || disproof.is_infinite() {
            return f32::INFINITY;
        }
        if disproof == 0.0 {
            return 0.0;
        }
        let p = self.byte_to_prob(prob);
        let mut proof = disproof as f64;
        if p > 0.5 {
            proof *= (0.5 / (1.0 - p)).powi(3);
        }
        proof.clamp(1.0, MAX_PROOF_NUMBER as f64) as f32
    }
}

/// Converts a probability to the byte scale.
#[inline]
pub fn prob_to_byte(p: f64) -> u8 {
    (rescale_prob(p) * PROB_STEP as f64).round() as u8
}

/// Adds two proof numbers, saturating at [`MAX_PROOF_NUMBER`].
#[inline]
pub fn combine_disproof(a: f32, b: f32) -> f32 {
    if a.is_infinite() || b.is_infinite() {
        f32::INFINITY
    } else {
        (a + b).min(MAX_PROOF_NUMBER)
    }
}

fn scaled_log(x: f64) -> i32 {
    if x.is_nan() || x <= 0.0 {
        return LOG_DERIVATIVE_MINUS_INF + 1;
    }
    (LOG_DERIVATIVE_MULTIPLIER * x.ln())
        .round()
        .clamp((LOG_DERIVATIVE_MINUS_INF + 1) as f64, -LOG_DERIVATIVE_MINUS_INF as f64) as i32
}

fn rescale_base(x: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        (-x.ln() + RESCALE_OFFSET).powf(RESCALE_EXPONENT)
    }
}

fn rescale_prob(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    (rescale_base(x) - rescale_base(1.0 - x)) / (2.0 * rescale_base(1.0)) + 0.5
}

fn inverse_rescale_prob(y: f64) -> f64 {
    bisect(rescale_prob, y, 0.0, 1.0)
}

/// The soft-min combiner: increasing on `[0, 1]`, `-inf` at 0 and 0 at 1.
fn combiner(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let y = x.powf(COMBINER_EXPONENT);
    let exponential = 2f64.powf(20.0 * (1.0 - y)) - 1.0;
    let poly_log = (-y.max(1e-30).ln()).powf(1.5);
    -(exponential * poly_log).powf(1.0 / COMBINER_EXPONENT)
}

fn combiner_derivative(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }
    // Near 1 the relative step underflows, so step down by at least one part in 1e12.
    let h = x.min(1.0 - x) * 1e-4;
    let lo = x - h.max(x * 1e-12);
    let hi = (x + h).min(1.0);
    (combiner(hi) - combiner(lo)) / (hi - lo)
}

/// Finds `x` in `[lo, hi]` with `f(x) = target` for an increasing `f`.
fn bisect(f: impl Fn(f64) -> f64, target: f64, mut lo: f64, mut hi: f64) -> f64 {
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if f(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Complementary error function, accurate to about 1.2e-7.
///
/// Reference: Numerical Recipes, `erfcc`.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.26551223
        + t * (1.00002368
            + t * (0.37409196
                + t * (0.09678418
                    + t * (-0.18628806
                        + t * (0.27886807
                            + t * (-1.13520398
                                + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277))))))));
    let ans = t * poly.exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

/// Cumulative distribution function of a normal distribution.
pub fn gaussian_cdf(x: f64, mean: f64, sigma: f64) -> f64 {
    0.5 * erfc(-(x - mean) / (sigma * std::f64::consts::SQRT_2))
}

/// Standard deviation, in discs, of a heuristic estimate.
///
/// Estimates are least reliable early in the midgame and improve with depth.
pub fn leaf_error(depth: u8, n_empties: u32) -> f64 {
    let e = n_empties as f64;
    if n_empties < 5 {
        return MIN_LEAF_ERROR;
    }
    let peak = PEAK_LEAF_ERROR - 0.6 * (depth.clamp(1, 4) - 1) as f64;
    (peak - 0.15 * (e - PEAK_ERROR_EMPTIES).abs()).max(MIN_LEAF_ERROR)
}

/// Probability that a position with the given estimate is worth at least `goal`.
pub fn leaf_win_probability(goal: f64, estimate: f64, depth: u8, n_empties: u32) -> f64 {
    1.0 - gaussian_cdf(goal, estimate, leaf_error(depth, n_empties))
}

fn leaf_log_effort(n_empties: u32, n_moves: u32, signed_distance: f64) -> f32 {
    let log_pn = LOG_PROOF_BASE
        + LOG_PROOF_PER_EMPTY * n_empties as f64
        + LOG_PROOF_PER_LOG_MOVE * ((n_moves + 1) as f64).ln()
        + LOG_PROOF_PER_DISC * signed_distance.clamp(-64.0, 64.0);
    log_pn.exp().clamp(1.0, MAX_PROOF_NUMBER as f64) as f32
}

/// Estimated effort to prove that a leaf is worth at least its goal.
///
/// # Arguments
///
/// * `n_empties` - Empty squares of the leaf.
/// * `n_replies` - Legal moves of the opponent, all of which must be refuted.
/// * `advantage` - Leaf estimate minus goal, in discs.
pub fn leaf_proof_number(n_empties: u32, n_replies: u32, advantage: f64) -> f32 {
    leaf_log_effort(n_empties, n_replies, -advantage)
}

/// Estimated effort to prove that a leaf is worth less than its goal.
///
/// # Arguments
///
/// * `n_empties` - Empty squares of the leaf.
/// * `n_moves` - Legal moves of the side to move, all of which must be refuted.
/// * `advantage` - Leaf estimate minus goal, in discs.
pub fn leaf_disproof_number(n_empties: u32, n_moves: u32, advantage: f64) -> f32 {
    leaf_log_effort(n_empties, n_moves, advantage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_scale_round_trip() {
        let t = tables();
        for b in 0..=255u8 {
            assert_eq!(prob_to_byte(t.byte_to_prob(b)), b);
        }
        assert_eq!(prob_to_byte(0.0), 0);
        assert_eq!(prob_to_byte(1.0), 255);
        assert_eq!(prob_to_byte(0.5), 128);
    }

    #[test]
    fn test_byte_scale_is_monotone() {
        let t = tables();
        for b in 1..=255u8 {
            assert!(t.byte_to_prob(b) > t.byte_to_prob(b - 1));
        }
    }

    #[test]
    fn test_combine_bounds() {
        let t = tables();
        for a in 0..=255u8 {
            assert_eq!(t.combine(a, 0), 0);
            for b in 0..=255u8 {
                let c = t.combine(a, b);
                assert!(c <= a && c <= b);
                assert_eq!(c, t.combine(b, a));
            }
        }
    }

    #[test]
    fn test_combine_with_certainty_is_identity() {
        let t = tables();
        for a in 20..=255u8 {
            assert_eq!(t.combine(a, 255), a, "byte {a}");
        }
    }

    #[test]
    fn test_combine_is_monotone() {
        let t = tables();
        for a in 0..=255u8 {
            for b in 1..=255u8 {
                assert!(t.combine(a, b) >= t.combine(a, b - 1));
            }
        }
    }

    #[test]
    fn test_log_derivatives_are_finite() {
        let t = tables();
        for b in 1..=254u8 {
            assert!(t.log_derivative(b) > LOG_DERIVATIVE_MINUS_INF);
            assert!(t.leaf_log_derivative(b) > LOG_DERIVATIVE_MINUS_INF);
        }
        assert_eq!(t.leaf_log_derivative(0), LOG_DERIVATIVE_MINUS_INF);
        assert_eq!(t.leaf_log_derivative(255), LOG_DERIVATIVE_MINUS_INF);
    }

    #[test]
    fn test_disproof_to_proof() {
        let t = tables();
        assert_eq!(t.disproof_to_proof(0.0, 100), 0.0);
        assert!(t.disproof_to_proof(0.0, 255).is_infinite());
        assert!(t.disproof_to_proof(f32::INFINITY, 10).is_infinite());
        assert_eq!(t.disproof_to_proof(100.0, prob_to_byte(0.3)), 100.0);
        assert!(t.disproof_to_proof(100.0, prob_to_byte(0.9)) > 1000.0);
    }

    #[test]
    fn test_combine_disproof_saturates() {
        assert_eq!(combine_disproof(1.0, 2.0), 3.0);
        assert_eq!(combine_disproof(MAX_PROOF_NUMBER, MAX_PROOF_NUMBER), MAX_PROOF_NUMBER);
        assert!(combine_disproof(f32::INFINITY, 0.0).is_infinite());
    }

    #[test]
    fn test_gaussian_cdf() {
        assert!((gaussian_cdf(0.0, 0.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((gaussian_cdf(1.0, 0.0, 1.0) - 0.841_344_7).abs() < 1e-6);
        assert!((gaussian_cdf(-1.96, 0.0, 1.0) - 0.025).abs() < 1e-3);
    }

    #[test]
    fn test_leaf_win_probability_decreases_with_goal() {
        let mut last = 1.0;
        for goal in (-63..=63).step_by(2) {
            let p = leaf_win_probability(goal as f64, 4.0, 2, 30);
            assert!(p <= last);
            last = p;
        }
        assert!(leaf_win_probability(-63.0, 4.0, 2, 30) > 0.99);
        assert!(leaf_win_probability(63.0, 4.0, 2, 30) < 0.01);
    }

    #[test]
    fn test_leaf_error_bounds() {
        for empties in 0..=60 {
            for depth in 1..=4 {
                let e = leaf_error(depth, empties);
                assert!((MIN_LEAF_ERROR..=PEAK_LEAF_ERROR).contains(&e));
            }
        }
    }

    #[test]
    fn test_leaf_proof_numbers() {
        // Far ahead: cheap to prove, expensive to disprove.
        assert!(leaf_proof_number(20, 5, 20.0) < leaf_disproof_number(20, 5, 20.0));
        // More empties means more work.
        assert!(leaf_proof_number(30, 5, 0.0) > leaf_proof_number(20, 5, 0.0));
        assert!(leaf_proof_number(0, 0, 64.0) >= 1.0);
    }
}

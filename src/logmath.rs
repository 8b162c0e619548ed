//! Log-domain arithmetic shared by the emission, inference and re-estimation code.
//!
//! Every probability in the training core is stored as a natural logarithm;
//! [`LOG_ZERO`] stands for probability 0.

/// Log of probability zero.
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// `ln(x)`, mapping `0` to [`LOG_ZERO`].
#[inline]
pub fn safe_log(x: f64) -> f64 {
    if x == 0.0 {
        LOG_ZERO
    } else {
        x.ln()
    }
}

/// `ln(Σ exp(v))`, shifted by the maximum so large magnitudes neither overflow nor vanish.
///
/// An empty slice, or one holding only [`LOG_ZERO`], yields [`LOG_ZERO`].
pub fn log_sum_exp(values: &[f64]) -> f64 {
    match values {
        [] => LOG_ZERO,
        [single] => *single,
        _ => {
            let max = values.iter().copied().fold(LOG_ZERO, f64::max);
            if max == LOG_ZERO {
                return LOG_ZERO;
            }
            let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
            max + sum.ln()
        }
    }
}

/// `ln(exp(a) + exp(b))`.
#[inline]
pub fn log_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if lo == LOG_ZERO {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(1 − Σ exp(v))`: the probability left over once `values` are taken out.
///
/// The linear sum is clamped to `[0, 1]`, so mass exceeding one through rounding
/// gives [`LOG_ZERO`] instead of NaN. An empty slice yields `0` (certainty).
pub fn log_complement(values: &[f64]) -> f64 {
    let taken = log_sum_exp(values).exp().clamp(0.0, 1.0);
    safe_log(1.0 - taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-12;

    #[test]
    fn safe_log_maps_zero_to_log_zero() {
        assert_eq!(safe_log(0.0), LOG_ZERO);
        assert!((safe_log(1.0)).abs() < EPS);
        assert!((safe_log(std::f64::consts::E) - 1.0).abs() < EPS);
    }

    #[test]
    fn log_sum_exp_single_value_is_identity() {
        assert_eq!(log_sum_exp(&[-3.25]), -3.25);
        assert_eq!(log_sum_exp(&[LOG_ZERO]), LOG_ZERO);
    }

    #[test]
    fn log_sum_exp_all_log_zero() {
        assert_eq!(log_sum_exp(&[LOG_ZERO, LOG_ZERO, LOG_ZERO]), LOG_ZERO);
        assert_eq!(log_sum_exp(&[]), LOG_ZERO);
    }

    #[test]
    fn log_sum_exp_matches_linear_sum() {
        let probs = [0.1f64, 0.2, 0.3];
        let logs: Vec<f64> = probs.iter().map(|p| p.ln()).collect();
        assert!((log_sum_exp(&logs) - 0.6f64.ln()).abs() < EPS);
    }

    #[test]
    fn log_sum_exp_survives_extreme_magnitudes() {
        let v = log_sum_exp(&[-1000.0, -1000.0]);
        assert!((v - (-1000.0 + 2f64.ln())).abs() < 1e-9);
        let v = log_sum_exp(&[800.0, 800.0]);
        assert!((v - (800.0 + 2f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn log_sum_exp_is_order_invariant() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let len = rng.gen_range(1..12);
            let mut values: Vec<f64> = (0..len).map(|_| rng.gen_range(-50.0..5.0)).collect();
            if rng.gen_bool(0.3) {
                values.push(LOG_ZERO);
            }
            let before = log_sum_exp(&values);
            values.shuffle(&mut rng);
            let after = log_sum_exp(&values);
            assert!((before - after).abs() < 1e-9, "{before} vs {after}");
        }
    }

    #[test]
    fn log_add_agrees_with_log_sum_exp() {
        assert!((log_add(-1.0, -2.0) - log_sum_exp(&[-1.0, -2.0])).abs() < EPS);
        assert_eq!(log_add(LOG_ZERO, -4.0), -4.0);
        assert_eq!(log_add(-4.0, LOG_ZERO), -4.0);
        assert_eq!(log_add(LOG_ZERO, LOG_ZERO), LOG_ZERO);
    }

    #[test]
    fn log_complement_of_single_value() {
        let v = 0.25f64.ln();
        assert!((log_complement(&[v]) - safe_log(1.0 - v.exp())).abs() < EPS);
    }

    #[test]
    fn log_complement_of_empty_is_certainty() {
        assert_eq!(log_complement(&[]), 0.0);
    }

    #[test]
    fn log_complement_clamps_excess_mass() {
        // 0.6 + 0.6 > 1
        let v = 0.6f64.ln();
        assert_eq!(log_complement(&[v, v]), LOG_ZERO);
        assert_eq!(log_complement(&[0.0]), LOG_ZERO);
    }
}

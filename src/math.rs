#[inline]
pub(crate) fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + 2f64.ln();
    }
    let diff = a - b;
    if diff > 0. {
        a + (-diff).exp().ln_1p()
    } else if diff < 0. {
        b + diff.exp().ln_1p()
    } else {
        // diff is NAN
        diff
    }
}

/// `log(sum(exp(values)))`, `-inf` for an empty slice.
pub fn logsumexp(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, logaddexp)
}

/// `log(mean(exp(values)))`.
pub fn log_mean_exp(values: &[f64]) -> f64 {
    logsumexp(values) - (values.len() as f64).ln()
}

/// Subtract the log normalizer so that the weights exponentiate to one.
pub fn normalize_log_weights(log_weights: &[f64]) -> Vec<f64> {
    let total = logsumexp(log_weights);
    log_weights.iter().map(|w| w - total).collect()
}

/// `min(1, exp(log_ratio))`, with NaN treated as a zero-probability move.
pub fn acceptance_probability(log_ratio: f64) -> f64 {
    if log_ratio.is_nan() {
        return 0.;
    }
    log_ratio.min(0.).exp().clamp(0., 1.)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn check_logaddexp(x in -10f64..10f64, y in -10f64..10f64) {
            let a = (x.exp() + y.exp()).ln();
            let b = logaddexp(x, y);
            let neginf = f64::NEG_INFINITY;
            let nan = f64::NAN;
            prop_assert!((a - b).abs() < 1e-10);
            prop_assert_eq!(b, logaddexp(y, x));
            prop_assert_eq!(x, logaddexp(x, neginf));
            prop_assert_eq!(logaddexp(neginf, neginf), neginf);
            prop_assert!(logaddexp(nan, x).is_nan());
        }

        #[test]
        fn logsumexp_matches_naive(values in prop::collection::vec(-50f64..50f64, 1..20)) {
            let naive = values.iter().map(|v| v.exp()).sum::<f64>().ln();
            prop_assert!((logsumexp(&values) - naive).abs() < 1e-9);

            let normalized = normalize_log_weights(&values);
            let total: f64 = normalized.iter().map(|w| w.exp()).sum();
            prop_assert!((total - 1.).abs() < 1e-9);
        }

        #[test]
        fn acceptance_is_a_probability(log_ratio in prop::num::f64::ANY) {
            let p = acceptance_probability(log_ratio);
            prop_assert!((0. ..=1.).contains(&p));
        }
    }

    #[test]
    fn check_neginf() {
        assert_eq!(logaddexp(f64::NEG_INFINITY, 2.), 2.);
        assert_eq!(logaddexp(2., f64::NEG_INFINITY), 2.);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_eq!(logsumexp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn degenerate_acceptance() {
        assert_eq!(acceptance_probability(f64::NEG_INFINITY), 0.);
        assert_eq!(acceptance_probability(f64::NAN), 0.);
        assert_eq!(acceptance_probability(f64::INFINITY), 1.);
        assert_eq!(acceptance_probability(0.), 1.);
        assert_abs_diff_eq!(acceptance_probability(-1.), (-1f64).exp());
        assert_abs_diff_eq!(log_mean_exp(&[0., 0., 0.]), 0.);
    }
}

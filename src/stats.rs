//! Small numeric helpers shared by the simulators (small + explicit).
//!
//! These are “glass box” utilities: they validate their inputs, accumulate in
//! `f64`, and return errors instead of guessing at degenerate cases.

use crate::{Error, Result};
use ndarray::ArrayView1;

/// Pearson correlation coefficient between two equal-length series.
///
/// Returns a value in `[-1, 1]` (up to floating roundoff). Constant inputs
/// have no defined correlation and are rejected as a domain error — callers
/// that can produce them must decide the policy themselves.
pub fn pearson(x: &ArrayView1<f64>, y: &ArrayView1<f64>) -> Result<f64> {
    let n = x.len();
    if y.len() != n {
        return Err(Error::Shape("x and y must have the same length"));
    }
    if n < 2 {
        return Err(Error::Domain("correlation needs at least two observations"));
    }
    if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
        return Err(Error::Domain("x and y must be finite"));
    }

    let nf = n as f64;
    let mx = x.sum() / nf;
    let my = y.sum() / nf;

    let mut sxy = 0.0f64;
    let mut sxx = 0.0f64;
    let mut syy = 0.0f64;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return Err(Error::Domain("correlation is undefined for constant series"));
    }
    Ok(sxy / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use proptest::prelude::*;

    #[test]
    fn perfectly_linear_series_correlate_to_one() {
        let x = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = Array1::from_vec(vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        let r = pearson(&x.view(), &y.view()).unwrap();
        assert!((r - 1.0).abs() <= 1e-12, "expected r=1, got {r}");

        let neg = Array1::from_vec(vec![10.0, 8.0, 6.0, 4.0, 2.0]);
        let r = pearson(&x.view(), &neg.view()).unwrap();
        assert!((r + 1.0).abs() <= 1e-12, "expected r=-1, got {r}");
    }

    #[test]
    fn constant_series_are_rejected() {
        let x = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let c = Array1::from_vec(vec![5.0, 5.0, 5.0]);
        assert!(pearson(&x.view(), &c.view()).is_err());
        assert!(pearson(&c.view(), &x.view()).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let x = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let y = Array1::from_vec(vec![1.0, 2.0]);
        assert!(pearson(&x.view(), &y.view()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]
        #[test]
        fn prop_pearson_is_symmetric_bounded_and_shift_invariant(
            len in 3usize..64,
            seed in any::<u64>(),
            shift in -100.0f64..100.0,
        ) {
            use rand::SeedableRng;
            use rand_chacha::ChaCha8Rng;
            use rand_distr::{Distribution, StandardNormal};

            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut x = Array1::<f64>::zeros(len);
            let mut y = Array1::<f64>::zeros(len);
            for i in 0..len {
                x[i] = StandardNormal.sample(&mut rng);
                y[i] = StandardNormal.sample(&mut rng);
            }
            // StandardNormal draws are constant with probability zero.
            prop_assume!(x.iter().any(|&v| v != x[0]));
            prop_assume!(y.iter().any(|&v| v != y[0]));

            let rxy = pearson(&x.view(), &y.view()).unwrap();
            let ryx = pearson(&y.view(), &x.view()).unwrap();
            prop_assert!((rxy - ryx).abs() <= 1e-12);
            prop_assert!(rxy.abs() <= 1.0 + 1e-12);

            let shifted = x.mapv(|v| v + shift);
            let rs = pearson(&shifted.view(), &y.view()).unwrap();
            prop_assert!((rxy - rs).abs() <= 1e-6, "shift changed r: {rxy} vs {rs}");
        }
    }
}

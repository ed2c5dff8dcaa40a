//! Small numerically-stable math utilities used by likelihoods and samplers.

/// Stable `log(exp(a) + exp(b))`.
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        max + ((a - max).exp() + (b - max).exp()).ln()
    }
}

/// Stable `log(sum(exp(xs)))`. Empty input gives `-inf`.
pub fn logsumexp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let s: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + s.ln()
}

/// Natural log of the modified Bessel function of the first kind, order 0.
///
/// Polynomial approximations from Abramowitz & Stegun 9.8.1 / 9.8.2
/// (relative error below 2e-7). The large-argument branch never forms
/// `I0(x)` itself, so it stays finite for any finite `x`.
pub fn ln_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax <= 3.75 {
        let t = (ax / 3.75).powi(2);
        let i0 = 1.0
            + t * (3.515_622_9
                + t * (3.089_942_4
                    + t * (1.206_749_2 + t * (0.265_973_2 + t * (0.036_076_8 + t * 0.004_581_3)))));
        i0.ln()
    } else {
        let t = 3.75 / ax;
        let poly = 0.398_942_28
            + t * (0.013_285_92
                + t * (0.002_253_19
                    + t * (-0.001_575_65
                        + t * (0.009_162_81
                            + t * (-0.020_577_06
                                + t * (0.026_355_37 + t * (-0.016_476_33 + t * 0.003_923_77)))))));
        ax - 0.5 * ax.ln() + poly.ln()
    }
}

/// Trapezoid quadrature weights for (possibly non-uniform) nodes `xs`.
pub fn trapezoid_weights(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut w = vec![0.0; n];
    if n < 2 {
        return w;
    }
    for i in 0..n - 1 {
        let h = 0.5 * (xs[i + 1] - xs[i]);
        w[i] += h;
        w[i + 1] += h;
    }
    w
}

/// `n` evenly spaced values on `[start, stop]` (inclusive).
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { stop } else { start + step * i as f64 }).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_logsumexp_matches_naive() {
        let xs = [-1.0, 0.5, 2.0];
        let naive: f64 = xs.iter().map(|x: &f64| x.exp()).sum::<f64>().ln();
        assert_relative_eq!(logsumexp(&xs), naive, epsilon = 1e-12);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_eq!(logsumexp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_add_exp_extremes() {
        assert_relative_eq!(log_add_exp(1000.0, 1000.0), 1000.0 + 2.0_f64.ln(), epsilon = 1e-9);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert_relative_eq!(log_add_exp(f64::NEG_INFINITY, 3.0), 3.0);
    }

    #[test]
    fn test_ln_i0_reference_values() {
        assert_relative_eq!(ln_i0(0.0), 0.0, epsilon = 1e-12);
        // I0(1) = 1.2660658777520082, I0(5) = 27.239871823604442, I0(20) = 4.355828255955353e7
        assert_relative_eq!(ln_i0(1.0), 1.266_065_877_752_008_2_f64.ln(), epsilon = 1e-6);
        assert_relative_eq!(ln_i0(5.0), 27.239_871_823_604_442_f64.ln(), epsilon = 1e-6);
        assert_relative_eq!(ln_i0(20.0), 4.355_828_255_955_353e7_f64.ln(), epsilon = 1e-6);
        assert!(ln_i0(1e6).is_finite());
        assert_relative_eq!(ln_i0(-2.0), ln_i0(2.0));
    }

    #[test]
    fn test_ln_i0_branch_continuity() {
        let below = ln_i0(3.75 - 1e-9);
        let above = ln_i0(3.75 + 1e-9);
        assert!((below - above).abs() < 1e-6, "{below} vs {above}");
    }

    #[test]
    fn test_trapezoid_integrates_linear_exactly() {
        let xs = [0.0, 0.5, 2.0, 3.0];
        let w = trapezoid_weights(&xs);
        let integral: f64 = xs.iter().zip(w.iter()).map(|(x, w)| x * w).sum();
        assert_relative_eq!(integral, 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_linspace_endpoints() {
        let xs = linspace(20.0, 1000.0, 5);
        assert_eq!(xs.len(), 5);
        assert_eq!(xs[0], 20.0);
        assert_eq!(xs[4], 1000.0);
        assert_relative_eq!(xs[2], 510.0);
    }
}

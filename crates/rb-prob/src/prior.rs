//! One-dimensional priors.
//!
//! Every prior supports three views of the same distribution:
//! - `ln_prob(x)`: log-density (`-inf` outside the support)
//! - `rescale(u)`: inverse CDF, mapping the unit interval onto the support
//!   (the "prior transform" used by nested sampling)
//! - `sample(rng)`: a draw via `rescale` of a uniform variate

use rb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::f64::consts::{FRAC_PI_2, PI};

/// Behaviour of a sampler's random walk when it steps past a prior bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// Wrap around (angles).
    Periodic,
    /// Mirror back into the support.
    Reflective,
}

fn default_zero() -> f64 {
    0.0
}

fn default_pi() -> f64 {
    PI
}

fn default_minus_half_pi() -> f64 {
    -FRAC_PI_2
}

fn default_half_pi() -> f64 {
    FRAC_PI_2
}

/// Prior distribution for a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Prior {
    /// Flat on `[minimum, maximum]`.
    Uniform {
        /// Lower bound.
        minimum: f64,
        /// Upper bound.
        maximum: f64,
        /// Random-walk boundary behaviour.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        boundary: Option<Boundary>,
    },
    /// `p(x) ∝ sin(x)`; isotropic inclination angles.
    Sine {
        /// Lower bound (default 0).
        #[serde(default = "default_zero")]
        minimum: f64,
        /// Upper bound (default π).
        #[serde(default = "default_pi")]
        maximum: f64,
        /// Random-walk boundary behaviour.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        boundary: Option<Boundary>,
    },
    /// `p(x) ∝ cos(x)`; isotropic declination.
    Cosine {
        /// Lower bound (default -π/2).
        #[serde(default = "default_minus_half_pi")]
        minimum: f64,
        /// Upper bound (default π/2).
        #[serde(default = "default_half_pi")]
        maximum: f64,
        /// Random-walk boundary behaviour.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        boundary: Option<Boundary>,
    },
    /// `p(x) ∝ x^alpha` on `[minimum, maximum]`; `alpha = 2` is uniform in volume.
    PowerLaw {
        /// Power-law index.
        alpha: f64,
        /// Lower bound (> 0).
        minimum: f64,
        /// Upper bound.
        maximum: f64,
        /// Random-walk boundary behaviour.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        boundary: Option<Boundary>,
    },
    /// Normal `N(mu, sigma)`.
    Gaussian {
        /// Mean.
        mu: f64,
        /// Standard deviation (> 0).
        sigma: f64,
    },
    /// Fixed value; not searched by samplers.
    DeltaFunction {
        /// The value.
        peak: f64,
    },
}

impl Prior {
    /// Uniform prior without boundary behaviour.
    pub fn uniform(minimum: f64, maximum: f64) -> Self {
        Prior::Uniform { minimum, maximum, boundary: None }
    }

    /// Uniform prior over an angle, wrapping periodically.
    pub fn periodic(minimum: f64, maximum: f64) -> Self {
        Prior::Uniform { minimum, maximum, boundary: Some(Boundary::Periodic) }
    }

    /// Check that parameters describe a proper distribution.
    pub fn validate(&self) -> Result<()> {
        let bounded = |minimum: f64, maximum: f64| -> Result<()> {
            if !minimum.is_finite() || !maximum.is_finite() || minimum >= maximum {
                return Err(Error::Validation(format!(
                    "prior bounds must be finite with minimum < maximum, got [{minimum}, {maximum}]"
                )));
            }
            Ok(())
        };
        match *self {
            Prior::Uniform { minimum, maximum, .. } => bounded(minimum, maximum),
            Prior::Sine { minimum, maximum, .. } => {
                bounded(minimum, maximum)?;
                if minimum < 0.0 || maximum > PI {
                    return Err(Error::Validation(format!(
                        "Sine prior must lie within [0, π], got [{minimum}, {maximum}]"
                    )));
                }
                Ok(())
            }
            Prior::Cosine { minimum, maximum, .. } => {
                bounded(minimum, maximum)?;
                if minimum < -FRAC_PI_2 || maximum > FRAC_PI_2 {
                    return Err(Error::Validation(format!(
                        "Cosine prior must lie within [-π/2, π/2], got [{minimum}, {maximum}]"
                    )));
                }
                Ok(())
            }
            Prior::PowerLaw { alpha, minimum, maximum, .. } => {
                bounded(minimum, maximum)?;
                if !alpha.is_finite() {
                    return Err(Error::Validation(format!("PowerLaw alpha must be finite, got {alpha}")));
                }
                if minimum <= 0.0 {
                    return Err(Error::Validation(format!(
                        "PowerLaw minimum must be > 0, got {minimum}"
                    )));
                }
                Ok(())
            }
            Prior::Gaussian { mu, sigma } => {
                if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
                    return Err(Error::Validation(format!(
                        "Gaussian prior needs finite mu and sigma > 0, got mu={mu}, sigma={sigma}"
                    )));
                }
                Ok(())
            }
            Prior::DeltaFunction { peak } => {
                if !peak.is_finite() {
                    return Err(Error::Validation(format!("DeltaFunction peak must be finite, got {peak}")));
                }
                Ok(())
            }
        }
    }

    /// Support of the distribution. Gaussian priors are unbounded.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Prior::Uniform { minimum, maximum, .. }
            | Prior::Sine { minimum, maximum, .. }
            | Prior::Cosine { minimum, maximum, .. }
            | Prior::PowerLaw { minimum, maximum, .. } => (minimum, maximum),
            Prior::Gaussian { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            Prior::DeltaFunction { peak } => (peak, peak),
        }
    }

    /// Random-walk boundary behaviour, if any.
    pub fn boundary(&self) -> Option<Boundary> {
        match *self {
            Prior::Uniform { boundary, .. }
            | Prior::Sine { boundary, .. }
            | Prior::Cosine { boundary, .. }
            | Prior::PowerLaw { boundary, .. } => boundary,
            Prior::Gaussian { .. } | Prior::DeltaFunction { .. } => None,
        }
    }

    /// `true` for priors that pin the parameter to one value.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Prior::DeltaFunction { .. })
    }

    /// Log-density at `x`.
    pub fn ln_prob(&self, x: f64) -> f64 {
        let (lo, hi) = self.bounds();
        if !x.is_finite() || x < lo || x > hi {
            return f64::NEG_INFINITY;
        }
        match *self {
            Prior::Uniform { minimum, maximum, .. } => -(maximum - minimum).ln(),
            Prior::Sine { minimum, maximum, .. } => {
                let norm = minimum.cos() - maximum.cos();
                (x.sin() / norm).ln()
            }
            Prior::Cosine { minimum, maximum, .. } => {
                let norm = maximum.sin() - minimum.sin();
                (x.cos() / norm).ln()
            }
            Prior::PowerLaw { alpha, minimum, maximum, .. } => {
                if alpha == -1.0 {
                    -(x * (maximum / minimum).ln()).ln()
                } else {
                    let a1 = alpha + 1.0;
                    let norm = a1 / (maximum.powf(a1) - minimum.powf(a1));
                    norm.ln() + alpha * x.ln()
                }
            }
            Prior::Gaussian { mu, sigma } => match Normal::new(mu, sigma) {
                Ok(n) => n.ln_pdf(x),
                Err(_) => f64::NEG_INFINITY,
            },
            Prior::DeltaFunction { peak } => {
                if x == peak {
                    0.0
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    /// Map `u ∈ [0, 1]` to a parameter value (inverse CDF).
    pub fn rescale(&self, u: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&u) {
            return Err(Error::Validation(format!("unit-cube coordinate out of range: {u}")));
        }
        let v = match *self {
            Prior::Uniform { minimum, maximum, .. } => minimum + u * (maximum - minimum),
            Prior::Sine { minimum, maximum, .. } => {
                let (c0, c1) = (minimum.cos(), maximum.cos());
                (c0 - u * (c0 - c1)).clamp(-1.0, 1.0).acos()
            }
            Prior::Cosine { minimum, maximum, .. } => {
                let (s0, s1) = (minimum.sin(), maximum.sin());
                (s0 + u * (s1 - s0)).clamp(-1.0, 1.0).asin()
            }
            Prior::PowerLaw { alpha, minimum, maximum, .. } => {
                if alpha == -1.0 {
                    minimum * (maximum / minimum).powf(u)
                } else {
                    let a1 = alpha + 1.0;
                    let (l, h) = (minimum.powf(a1), maximum.powf(a1));
                    (l + u * (h - l)).powf(1.0 / a1)
                }
            }
            Prior::Gaussian { mu, sigma } => {
                let n = Normal::new(mu, sigma).map_err(|e| Error::Validation(e.to_string()))?;
                // Keep the tails finite.
                n.inverse_cdf(u.clamp(1e-300, 1.0 - f64::EPSILON))
            }
            Prior::DeltaFunction { peak } => peak,
        };
        let (lo, hi) = self.bounds();
        Ok(v.clamp(lo, hi))
    }

    /// Draw one value.
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.rescale(rng.random::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn all_priors() -> Vec<Prior> {
        vec![
            Prior::uniform(-2.0, 3.0),
            Prior::Sine { minimum: 0.0, maximum: PI, boundary: None },
            Prior::Cosine { minimum: -FRAC_PI_2, maximum: FRAC_PI_2, boundary: None },
            Prior::PowerLaw { alpha: 2.0, minimum: 10.0, maximum: 500.0, boundary: None },
            Prior::PowerLaw { alpha: -1.0, minimum: 1.0, maximum: 100.0, boundary: None },
        ]
    }

    #[test]
    fn test_rescale_stays_in_bounds_and_is_monotone() {
        for prior in all_priors() {
            let (lo, hi) = prior.bounds();
            let mut prev = f64::NEG_INFINITY;
            for i in 0..=100 {
                let x = prior.rescale(i as f64 / 100.0).unwrap();
                assert!(x >= lo && x <= hi, "{prior:?}: {x} outside [{lo}, {hi}]");
                assert!(x >= prev, "{prior:?}: rescale not monotone");
                prev = x;
            }
            assert_relative_eq!(prior.rescale(0.0).unwrap(), lo, epsilon = 1e-9);
            assert_relative_eq!(prior.rescale(1.0).unwrap(), hi, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_density_integrates_to_one() {
        for prior in all_priors() {
            let (lo, hi) = prior.bounds();
            let n = 20_000;
            let h = (hi - lo) / n as f64;
            let integral: f64 =
                (0..n).map(|i| prior.ln_prob(lo + (i as f64 + 0.5) * h).exp() * h).sum();
            assert_relative_eq!(integral, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_rescale_is_inverse_cdf() {
        // For a power law with alpha=2 on [0, 1] the CDF is x^3.
        let prior = Prior::PowerLaw { alpha: 2.0, minimum: 1e-9, maximum: 1.0, boundary: None };
        let x = prior.rescale(0.125).unwrap();
        assert_relative_eq!(x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_gaussian_median_and_density() {
        let prior = Prior::Gaussian { mu: 1.5, sigma: 0.5 };
        assert_relative_eq!(prior.rescale(0.5).unwrap(), 1.5, epsilon = 1e-9);
        let expected = -0.5 * (2.0 * PI).ln() - 0.5_f64.ln();
        assert_relative_eq!(prior.ln_prob(1.5), expected, epsilon = 1e-12);
        assert!(prior.rescale(0.0).unwrap().is_finite());
    }

    #[test]
    fn test_outside_support_is_neg_infinity() {
        let prior = Prior::uniform(0.0, 1.0);
        assert_eq!(prior.ln_prob(1.5), f64::NEG_INFINITY);
        assert_eq!(prior.ln_prob(f64::NAN), f64::NEG_INFINITY);
        let delta = Prior::DeltaFunction { peak: 2.0 };
        assert_eq!(delta.ln_prob(2.0), 0.0);
        assert_eq!(delta.ln_prob(2.1), f64::NEG_INFINITY);
        assert!(delta.is_fixed());
    }

    #[test]
    fn test_validate_rejects_bad_priors() {
        assert!(Prior::uniform(1.0, 1.0).validate().is_err());
        assert!(Prior::Gaussian { mu: 0.0, sigma: 0.0 }.validate().is_err());
        assert!(
            Prior::PowerLaw { alpha: 2.0, minimum: 0.0, maximum: 1.0, boundary: None }
                .validate()
                .is_err()
        );
        assert!(Prior::Sine { minimum: 0.0, maximum: 4.0, boundary: None }.validate().is_err());
        for prior in all_priors() {
            prior.validate().unwrap();
        }
    }

    #[test]
    fn test_rescale_rejects_out_of_range_unit_value() {
        assert!(Prior::uniform(0.0, 1.0).rescale(1.5).is_err());
    }

    #[test]
    fn test_sample_is_seeded() {
        let prior = Prior::Cosine { minimum: -FRAC_PI_2, maximum: FRAC_PI_2, boundary: None };
        let mut a = rand::rngs::StdRng::seed_from_u64(7);
        let mut b = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(prior.sample(&mut a).unwrap(), prior.sample(&mut b).unwrap());
        }
    }

    #[test]
    fn test_json_roundtrip_with_defaults() {
        let json = r#"{"type":"Sine"}"#;
        let prior: Prior = serde_json::from_str(json).unwrap();
        assert_eq!(prior, Prior::Sine { minimum: 0.0, maximum: PI, boundary: None });

        let json = r#"{"type":"Uniform","minimum":0.0,"maximum":6.283185307179586,"boundary":"periodic"}"#;
        let prior: Prior = serde_json::from_str(json).unwrap();
        assert_eq!(prior.boundary(), Some(Boundary::Periodic));
    }
}

//! Common data types for RelBin

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Named parameter values (`chirp_mass`, `luminosity_distance`, ...).
///
/// A `BTreeMap` keeps iteration order sorted by name, which fixes the
/// ordering of flattened parameter vectors.
pub type Parameters = BTreeMap<String, f64>;

/// Look up a required parameter.
pub fn require(params: &Parameters, key: &str) -> Result<f64> {
    params
        .get(key)
        .copied()
        .ok_or_else(|| Error::Validation(format!("missing parameter '{key}'")))
}

/// Inner products for one detector (or summed over detectors).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculatedSnrs {
    /// `<d, h>`; complex so phase marginalization can use its modulus.
    pub d_inner_h: Complex64,
    /// `<h, h>`.
    pub optimal_snr_squared: f64,
}

impl CalculatedSnrs {
    /// Zero contribution.
    pub const ZERO: CalculatedSnrs =
        CalculatedSnrs { d_inner_h: Complex64::new(0.0, 0.0), optimal_snr_squared: 0.0 };

    /// `<d, h> / sqrt(<h, h>)`, or zero when the template has no power.
    pub fn complex_matched_filter_snr(&self) -> Complex64 {
        if self.optimal_snr_squared > 0.0 {
            self.d_inner_h / self.optimal_snr_squared.sqrt()
        } else {
            Complex64::new(0.0, 0.0)
        }
    }

    /// Unmarginalized log-likelihood ratio: `Re<d,h> - <h,h>/2`.
    pub fn log_likelihood_ratio(&self) -> f64 {
        self.d_inner_h.re - 0.5 * self.optimal_snr_squared
    }
}

impl std::ops::Add for CalculatedSnrs {
    type Output = CalculatedSnrs;

    fn add(self, rhs: CalculatedSnrs) -> CalculatedSnrs {
        CalculatedSnrs {
            d_inner_h: self.d_inner_h + rhs.d_inner_h,
            optimal_snr_squared: self.optimal_snr_squared + rhs.optimal_snr_squared,
        }
    }
}

impl std::iter::Sum for CalculatedSnrs {
    fn sum<I: Iterator<Item = CalculatedSnrs>>(iter: I) -> CalculatedSnrs {
        iter.fold(CalculatedSnrs::ZERO, |acc, x| acc + x)
    }
}

//! Noise power spectral densities.

use crate::grid::FrequencyGrid;
use rb_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One-sided noise PSD model, 1/Hz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PowerSpectralDensity {
    /// Analytic fit to the Advanced LIGO design sensitivity (Ajith 2011):
    /// `S(f) = 1e-49 [x^-4.14 - 5 x^-2 + 111 (1 - x^2 + x^4/2) / (1 + x^2/2)]`,
    /// `x = f / 245.4 Hz`.
    #[default]
    AligoFit,
    /// White noise.
    Flat {
        /// PSD value, 1/Hz.
        value: f64,
    },
}

/// Below this frequency the analytic fit is frozen.
const ALIGO_FIT_FLOOR_HZ: f64 = 1.0;

impl PowerSpectralDensity {
    /// PSD at `frequency`.
    pub fn evaluate(&self, frequency: f64) -> f64 {
        match *self {
            PowerSpectralDensity::AligoFit => {
                let x = frequency.max(ALIGO_FIT_FLOOR_HZ) / 245.4;
                let x2 = x * x;
                1e-49
                    * (x.powf(-4.14) - 5.0 / x2
                        + 111.0 * (1.0 - x2 + 0.5 * x2 * x2) / (1.0 + 0.5 * x2))
            }
            PowerSpectralDensity::Flat { value } => value,
        }
    }

    /// PSD sampled on every grid point.
    pub fn array(&self, grid: &FrequencyGrid) -> Result<Vec<f64>> {
        if let PowerSpectralDensity::Flat { value } = *self {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Configuration(format!("flat PSD must be > 0, got {value}")));
            }
        }
        Ok(grid.frequencies().iter().map(|&f| self.evaluate(f)).collect())
    }
}

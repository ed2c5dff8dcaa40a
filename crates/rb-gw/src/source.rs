//! Analytic frequency-domain source models.

use crate::constants::{MPC_METERS, MSUN_SECONDS, SPEED_OF_LIGHT};
use crate::waveform::{FrequencyDomainSource, Polarizations};
use rb_core::types::require;
use rb_core::{Complex64, Error, Parameters, Result};
use std::f64::consts::{FRAC_PI_4, PI};

/// Stationary-phase inspiral of a compact binary, 1PN phase and Newtonian
/// amplitude, terminated at the Schwarzschild ISCO.
///
/// Parameters: `chirp_mass` (detector-frame solar masses), `mass_ratio`
/// (`q <= 1`; `q > 1` is inverted), `luminosity_distance` (Mpc), `theta_jn`
/// (rad) and `phase` (orbital phase at coalescence, rad). Coalescence time is
/// applied by the detector projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct InspiralTaylorF2;

/// Intrinsic quantities derived from the parameter map.
#[derive(Debug, Clone, Copy)]
struct Binary {
    chirp_mass_s: f64,
    total_mass_s: f64,
    eta: f64,
    distance_s: f64,
    cos_iota: f64,
    phase: f64,
}

impl Binary {
    fn from_parameters(params: &Parameters) -> Result<Self> {
        let chirp_mass = require(params, "chirp_mass")?;
        let mut q = require(params, "mass_ratio")?;
        let distance = require(params, "luminosity_distance")?;
        let theta_jn = require(params, "theta_jn")?;
        let phase = require(params, "phase")?;

        if !(chirp_mass.is_finite() && chirp_mass > 0.0) {
            return Err(Error::Validation(format!("chirp_mass must be > 0, got {chirp_mass}")));
        }
        if !(q.is_finite() && q > 0.0) {
            return Err(Error::Validation(format!("mass_ratio must be > 0, got {q}")));
        }
        if !(distance.is_finite() && distance > 0.0) {
            return Err(Error::Validation(format!(
                "luminosity_distance must be > 0, got {distance}"
            )));
        }
        if q > 1.0 {
            q = 1.0 / q;
        }
        let eta = q / ((1.0 + q) * (1.0 + q));
        let chirp_mass_s = chirp_mass * MSUN_SECONDS;
        Ok(Self {
            chirp_mass_s,
            total_mass_s: chirp_mass_s * eta.powf(-0.6),
            eta,
            distance_s: distance * MPC_METERS / SPEED_OF_LIGHT,
            cos_iota: theta_jn.cos(),
            phase,
        })
    }

    /// Frequency of the innermost stable circular orbit, Hz.
    fn f_isco(&self) -> f64 {
        1.0 / (6.0_f64.powf(1.5) * PI * self.total_mass_s)
    }

    fn strain(&self, f: f64) -> Complex64 {
        let amplitude = (5.0_f64 / 24.0).sqrt()
            * PI.powf(-2.0 / 3.0)
            * self.chirp_mass_s.powf(5.0 / 6.0)
            * f.powf(-7.0 / 6.0)
            / self.distance_s;
        let v = (PI * self.total_mass_s * f).cbrt();
        let v2 = v * v;
        let v5 = v2 * v2 * v;
        let pn = 1.0 + (3715.0 / 756.0 + 55.0 * self.eta / 9.0) * v2;
        let psi = -2.0 * self.phase - FRAC_PI_4 + 3.0 / (128.0 * self.eta * v5) * pn;
        Complex64::from_polar(amplitude, -psi)
    }
}

impl FrequencyDomainSource for InspiralTaylorF2 {
    fn name(&self) -> &str {
        "inspiral_taylor_f2"
    }

    fn polarizations(&self, frequencies: &[f64], params: &Parameters) -> Result<Polarizations> {
        let binary = Binary::from_parameters(params)?;
        let f_isco = binary.f_isco();
        let plus_factor = 0.5 * (1.0 + binary.cos_iota * binary.cos_iota);
        let cross_factor = Complex64::new(0.0, -binary.cos_iota);

        let mut pols = Polarizations::zeros(frequencies.len());
        for (k, &f) in frequencies.iter().enumerate() {
            if f <= 0.0 || f > f_isco {
                continue;
            }
            let h = binary.strain(f);
            pols.plus[k] = h * plus_factor;
            pols.cross[k] = h * cross_factor;
        }
        Ok(pols)
    }
}

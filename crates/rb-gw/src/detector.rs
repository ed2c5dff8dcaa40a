//! Detector geometry and interferometer data.

use crate::constants::{
    EARTH_SEMI_MAJOR_AXIS, EARTH_SEMI_MINOR_AXIS, GPS_EPOCH_JD, J2000_JD, SPEED_OF_LIGHT,
};
use crate::grid::FrequencyGrid;
use crate::waveform::{Polarizations, WaveformGenerator};
use nalgebra::{Matrix3, Vector3};
use rb_core::error::ensure_len;
use rb_core::types::require;
use rb_core::{CalculatedSnrs, Complex64, Error, Parameters, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Location and arm orientation of a ground-based L-shaped detector.
///
/// Angles in radians, elevation in metres above the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorGeometry {
    /// Geodetic latitude.
    pub latitude: f64,
    /// Longitude (east positive).
    pub longitude: f64,
    /// Elevation, m.
    pub elevation: f64,
    /// Azimuth of the x arm, measured from north towards east.
    pub xarm_azimuth: f64,
    /// Azimuth of the y arm.
    pub yarm_azimuth: f64,
    /// Tilt of the x arm above the local horizontal.
    #[serde(default)]
    pub xarm_tilt: f64,
    /// Tilt of the y arm.
    #[serde(default)]
    pub yarm_tilt: f64,
}

fn dms(deg: f64, min: f64, sec: f64) -> f64 {
    (deg.abs() + min / 60.0 + sec / 3600.0).to_radians() * deg.signum()
}

impl DetectorGeometry {
    /// LIGO Hanford.
    pub fn hanford() -> Self {
        Self {
            latitude: dms(46.0, 27.0, 18.528),
            longitude: -dms(119.0, 24.0, 27.5657),
            elevation: 142.554,
            xarm_azimuth: 125.9994_f64.to_radians(),
            yarm_azimuth: 215.9994_f64.to_radians(),
            xarm_tilt: -6.195e-4,
            yarm_tilt: 1.25e-5,
        }
    }

    /// LIGO Livingston.
    pub fn livingston() -> Self {
        Self {
            latitude: dms(30.0, 33.0, 46.4196),
            longitude: -dms(90.0, 46.0, 27.2654),
            elevation: -6.574,
            xarm_azimuth: 197.7165_f64.to_radians(),
            yarm_azimuth: 287.7165_f64.to_radians(),
            xarm_tilt: -3.121e-4,
            yarm_tilt: -6.107e-4,
        }
    }

    /// Virgo.
    pub fn virgo() -> Self {
        Self {
            latitude: dms(43.0, 37.0, 53.0921),
            longitude: dms(10.0, 30.0, 16.1878),
            elevation: 51.884,
            xarm_azimuth: 70.5674_f64.to_radians(),
            yarm_azimuth: 160.5674_f64.to_radians(),
            xarm_tilt: 0.0,
            yarm_tilt: 0.0,
        }
    }

    /// Geometry of a known detector by its short name (`H1`, `L1`, `V1`).
    pub fn known(name: &str) -> Option<Self> {
        match name {
            "H1" => Some(Self::hanford()),
            "L1" => Some(Self::livingston()),
            "V1" => Some(Self::virgo()),
            _ => None,
        }
    }

    /// Vertex position in Earth-fixed coordinates, m.
    pub fn vertex(&self) -> Vector3<f64> {
        let (a2, b2) = (EARTH_SEMI_MAJOR_AXIS.powi(2), EARTH_SEMI_MINOR_AXIS.powi(2));
        let (sin_lat, cos_lat) = self.latitude.sin_cos();
        let radius = a2 / (a2 * cos_lat * cos_lat + b2 * sin_lat * sin_lat).sqrt();
        let h = self.elevation;
        Vector3::new(
            (radius + h) * cos_lat * self.longitude.cos(),
            (radius + h) * cos_lat * self.longitude.sin(),
            (b2 / a2 * radius + h) * sin_lat,
        )
    }

    fn unit_vector_along_arm(&self, azimuth: f64, tilt: f64) -> Vector3<f64> {
        let (sin_lat, cos_lat) = self.latitude.sin_cos();
        let (sin_lon, cos_lon) = self.longitude.sin_cos();
        let e_long = Vector3::new(-sin_lon, cos_lon, 0.0);
        let e_lat = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let e_h = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
        e_long * (tilt.cos() * azimuth.cos())
            + e_lat * (tilt.cos() * azimuth.sin())
            + e_h * tilt.sin()
    }

    /// Detector tensor `(x⊗x − y⊗y) / 2`.
    pub fn detector_tensor(&self) -> Matrix3<f64> {
        let x = self.unit_vector_along_arm(self.xarm_azimuth, self.xarm_tilt);
        let y = self.unit_vector_along_arm(self.yarm_azimuth, self.yarm_tilt);
        0.5 * (x * x.transpose() - y * y.transpose())
    }

    /// Antenna responses `(F+, Fx)` for a source at `(ra, dec)` with
    /// polarization angle `psi` at GPS time `gps_time`.
    pub fn antenna_response(&self, ra: f64, dec: f64, gps_time: f64, psi: f64) -> (f64, f64) {
        let (plus, cross) = polarization_tensors(ra, dec, gps_time, psi);
        let d = self.detector_tensor();
        (d.component_mul(&plus).sum(), d.component_mul(&cross).sum())
    }

    /// Arrival-time offset of a plane wave from `(ra, dec)` at this detector
    /// relative to the geocentre, s.
    pub fn time_delay_from_geocenter(&self, ra: f64, dec: f64, gps_time: f64) -> f64 {
        let gmst = greenwich_mean_sidereal_time(gps_time);
        let phi = ra - gmst;
        let theta = FRAC_PI_2 - dec;
        let omega =
            Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
        -omega.dot(&self.vertex()) / SPEED_OF_LIGHT
    }
}

/// Greenwich mean sidereal time in radians (IAU 1982 linear term; leap
/// seconds are ignored).
pub fn greenwich_mean_sidereal_time(gps_time: f64) -> f64 {
    let days = GPS_EPOCH_JD + gps_time / 86_400.0 - J2000_JD;
    let hours = (18.697_374_558 + 24.065_709_824_419_08 * days).rem_euclid(24.0);
    hours * PI / 12.0
}

fn polarization_tensors(ra: f64, dec: f64, gps_time: f64, psi: f64) -> (Matrix3<f64>, Matrix3<f64>) {
    let gmst = greenwich_mean_sidereal_time(gps_time);
    let phi = ra - gmst;
    let theta = FRAC_PI_2 - dec;
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_psi, cos_psi) = psi.sin_cos();
    let u = Vector3::new(cos_phi * cos_theta, cos_theta * sin_phi, -sin_theta);
    let v = Vector3::new(-sin_phi, cos_phi, 0.0);
    let m = -u * sin_psi - v * cos_psi;
    let n = -u * cos_psi + v * sin_psi;
    let plus = m * m.transpose() - n * n.transpose();
    let cross = m * n.transpose() + n * m.transpose();
    (plus, cross)
}

/// Observed data from one detector: strain and PSD on a shared grid.
#[derive(Debug, Clone)]
pub struct Interferometer {
    name: String,
    geometry: DetectorGeometry,
    grid: FrequencyGrid,
    start_time: f64,
    strain: Vec<Complex64>,
    psd: Vec<f64>,
}

impl Interferometer {
    /// Wrap detector data. `strain` and `psd` must have one value per grid
    /// point, and the PSD must be positive and finite inside the band.
    pub fn new(
        name: impl Into<String>,
        geometry: DetectorGeometry,
        grid: FrequencyGrid,
        start_time: f64,
        strain: Vec<Complex64>,
        psd: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        ensure_len(&format!("{name} strain"), grid.len(), strain.len())?;
        ensure_len(&format!("{name} PSD"), grid.len(), psd.len())?;
        if let Some(k) = grid.valid_indices().find(|&k| !(psd[k].is_finite() && psd[k] > 0.0)) {
            return Err(Error::Configuration(format!(
                "{name}: PSD must be positive and finite inside the band, got {} at {} Hz",
                psd[k],
                grid.frequencies()[k]
            )));
        }
        Ok(Self { name, geometry, grid, start_time, strain, psd })
    }

    /// Detector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Geometry.
    pub fn geometry(&self) -> &DetectorGeometry {
        &self.geometry
    }

    /// Frequency grid.
    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    /// GPS start time of the data segment.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Segment duration, s.
    pub fn duration(&self) -> f64 {
        self.grid.duration()
    }

    /// Frequency-domain strain.
    pub fn strain(&self) -> &[Complex64] {
        &self.strain
    }

    /// One-sided PSD.
    pub fn psd(&self) -> &[f64] {
        &self.psd
    }

    /// Project polarizations sampled at `frequencies` onto this detector,
    /// including the geocentre-to-detector time shift.
    ///
    /// Requires `ra`, `dec`, `psi` and `geocent_time` in `params`.
    pub fn detector_response(
        &self,
        polarizations: &Polarizations,
        params: &Parameters,
        frequencies: &[f64],
    ) -> Result<Vec<Complex64>> {
        polarizations.ensure_len(&format!("{} detector response", self.name), frequencies.len())?;
        let ra = require(params, "ra")?;
        let dec = require(params, "dec")?;
        let psi = require(params, "psi")?;
        let geocent_time = require(params, "geocent_time")?;

        let (f_plus, f_cross) = self.geometry.antenna_response(ra, dec, geocent_time, psi);
        let dt = self.geometry.time_delay_from_geocenter(ra, dec, geocent_time);
        let shift = geocent_time - self.start_time + dt;

        Ok(frequencies
            .iter()
            .zip(polarizations.plus.iter().zip(polarizations.cross.iter()))
            .map(|(&f, (&hp, &hc))| {
                (hp * f_plus + hc * f_cross) * Complex64::from_polar(1.0, -2.0 * PI * f * shift)
            })
            .collect())
    }

    /// Detector response on the full grid, zero outside the band.
    pub fn grid_response(
        &self,
        polarizations: &Polarizations,
        params: &Parameters,
    ) -> Result<Vec<Complex64>> {
        let mut signal = self.detector_response(polarizations, params, self.grid.frequencies())?;
        let zero = Complex64::new(0.0, 0.0);
        for (s, &m) in signal.iter_mut().zip(self.grid.mask()) {
            if !m {
                *s = zero;
            }
        }
        Ok(signal)
    }

    /// Noise-weighted inner product `<signal, d> = 4/T Σ conj(signal) d / S`
    /// over the band.
    pub fn inner_product(&self, signal: &[Complex64]) -> Result<Complex64> {
        ensure_len(&format!("{} inner product", self.name), self.grid.len(), signal.len())?;
        let scale = 4.0 / self.duration();
        Ok(self
            .grid
            .valid_indices()
            .map(|k| signal[k].conj() * self.strain[k] / self.psd[k])
            .sum::<Complex64>()
            * scale)
    }

    /// `<signal, signal>` over the band.
    pub fn optimal_snr_squared(&self, signal: &[Complex64]) -> Result<f64> {
        ensure_len(&format!("{} optimal SNR", self.name), self.grid.len(), signal.len())?;
        let scale = 4.0 / self.duration();
        Ok(self.grid.valid_indices().map(|k| signal[k].norm_sqr() / self.psd[k]).sum::<f64>() * scale)
    }

    /// Both inner products for a dense-grid signal.
    pub fn calculate_snrs(&self, signal: &[Complex64]) -> Result<CalculatedSnrs> {
        Ok(CalculatedSnrs {
            d_inner_h: self.inner_product(signal)?,
            optimal_snr_squared: self.optimal_snr_squared(signal)?,
        })
    }

    /// `-<d, d> / 2`.
    pub fn noise_log_likelihood(&self) -> f64 {
        let scale = 4.0 / self.duration();
        let dd: f64 =
            self.grid.valid_indices().map(|k| self.strain[k].norm_sqr() / self.psd[k]).sum();
        -0.5 * scale * dd
    }

    /// Add the detector response of a simulated signal to the data.
    ///
    /// Returns the signal's inner products with the data after injection.
    pub fn inject_signal(
        &mut self,
        generator: &WaveformGenerator,
        params: &Parameters,
    ) -> Result<CalculatedSnrs> {
        self.grid.check_sampling(
            generator.sampling_frequency(),
            generator.duration(),
            &format!("{} injection", self.name),
        )?;
        let pols = generator.frequency_domain_strain(params)?;
        let signal = self.grid_response(&pols, params)?;
        for (d, s) in self.strain.iter_mut().zip(signal.iter()) {
            *d += *s;
        }
        let snrs = self.calculate_snrs(&signal)?;
        log::info!(
            "{}: injected signal, optimal SNR = {:.3}, matched-filter SNR = {:.3}",
            self.name,
            snrs.optimal_snr_squared.sqrt(),
            snrs.complex_matched_filter_snr().re
        );
        Ok(snrs)
    }
}

/// Fail unless every interferometer shares the generator's sampling and one
/// common frequency band.
pub fn check_compatibility(
    interferometers: &[Interferometer],
    generator: &WaveformGenerator,
) -> Result<()> {
    let first = interferometers
        .first()
        .ok_or_else(|| Error::Configuration("at least one interferometer is required".into()))?;
    for ifo in interferometers {
        ifo.grid().check_sampling(
            generator.sampling_frequency(),
            generator.duration(),
            &format!("waveform generator vs {} data", ifo.name()),
        )?;
        if ifo.grid() != first.grid() {
            return Err(Error::Configuration(format!(
                "{} and {} use different frequency bands",
                first.name(),
                ifo.name()
            )));
        }
    }
    Ok(())
}

//! Dense-grid gravitational-wave transient likelihood.

use crate::detector::{Interferometer, check_compatibility};
use crate::marginalization::Marginalization;
use crate::waveform::WaveformGenerator;
use rb_core::{CalculatedSnrs, LogLikelihood, Parameters, Result};

/// Gaussian-noise likelihood of a transient signal, evaluating the waveform
/// on every grid point.
///
/// Reference for the relative-binning approximation and the likelihood it
/// falls back to when exactness matters.
#[derive(Debug, Clone)]
pub struct GravitationalWaveTransient {
    interferometers: Vec<Interferometer>,
    generator: WaveformGenerator,
    marginalization: Marginalization,
    noise_log_likelihood: f64,
}

impl GravitationalWaveTransient {
    /// Fails if the detectors disagree with the generator's sampling or with
    /// each other's band.
    pub fn new(interferometers: Vec<Interferometer>, generator: WaveformGenerator) -> Result<Self> {
        check_compatibility(&interferometers, &generator)?;
        let noise_log_likelihood = interferometers.iter().map(Interferometer::noise_log_likelihood).sum();
        Ok(Self { interferometers, generator, marginalization: Marginalization::none(), noise_log_likelihood })
    }

    /// Integrate out phase and/or distance.
    pub fn with_marginalization(mut self, marginalization: Marginalization) -> Self {
        self.marginalization = marginalization;
        self
    }

    /// Detectors.
    pub fn interferometers(&self) -> &[Interferometer] {
        &self.interferometers
    }

    /// Waveform generator.
    pub fn generator(&self) -> &WaveformGenerator {
        &self.generator
    }

    /// Marginalization settings.
    pub fn marginalization(&self) -> &Marginalization {
        &self.marginalization
    }

    /// `params` with marginalized parameters pinned to their reference values.
    pub fn prepare_parameters(&self, params: &Parameters) -> Parameters {
        let mut prepared = params.clone();
        self.marginalization.prepare_parameters(&mut prepared);
        prepared
    }

    /// Dense inner products summed over detectors, at the prepared parameters.
    pub fn calculate_snrs(&self, params: &Parameters) -> Result<CalculatedSnrs> {
        let prepared = self.prepare_parameters(params);
        let polarizations = self.generator.frequency_domain_strain(&prepared)?;
        let mut total = CalculatedSnrs::ZERO;
        for ifo in &self.interferometers {
            let signal = ifo.grid_response(&polarizations, &prepared)?;
            total = total + ifo.calculate_snrs(&signal)?;
        }
        Ok(total)
    }
}

impl LogLikelihood for GravitationalWaveTransient {
    fn log_likelihood_ratio(&self, params: &Parameters) -> Result<f64> {
        let snrs = self.calculate_snrs(params)?;
        Ok(self.marginalization.log_likelihood_ratio(&snrs))
    }

    fn noise_log_likelihood(&self) -> Result<f64> {
        Ok(self.noise_log_likelihood)
    }
}

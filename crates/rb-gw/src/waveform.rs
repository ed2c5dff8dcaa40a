//! Frequency-domain waveform generation.
//!
//! A [`FrequencyDomainSource`] maps an explicit list of frequencies and a
//! parameter map to plus/cross polarizations. The [`WaveformGenerator`] owns
//! the dense grid and enforces that every source returns exactly one value per
//! requested frequency, so a waveform evaluated on the wrong frequency set is
//! reported as a shape error instead of reaching a likelihood.

use crate::grid::FrequencyGrid;
use rb_core::error::ensure_len;
use rb_core::{Complex64, Parameters, Result};
use std::fmt;
use std::sync::Arc;

/// Plus and cross polarizations sampled on some frequency set.
#[derive(Debug, Clone, PartialEq)]
pub struct Polarizations {
    /// Plus polarization.
    pub plus: Vec<Complex64>,
    /// Cross polarization.
    pub cross: Vec<Complex64>,
}

impl Polarizations {
    /// `n` zeros per mode.
    pub fn zeros(n: usize) -> Self {
        Self { plus: vec![Complex64::new(0.0, 0.0); n], cross: vec![Complex64::new(0.0, 0.0); n] }
    }

    /// Number of samples (of the plus mode).
    pub fn len(&self) -> usize {
        self.plus.len()
    }

    /// `true` if no samples.
    pub fn is_empty(&self) -> bool {
        self.plus.is_empty()
    }

    /// Fail unless both modes hold exactly `expected` samples.
    pub fn ensure_len(&self, context: &str, expected: usize) -> Result<()> {
        ensure_len(&format!("{context} (plus)"), expected, self.plus.len())?;
        ensure_len(&format!("{context} (cross)"), expected, self.cross.len())
    }

    /// Values at the given indices.
    pub fn gather(&self, indices: &[usize]) -> Polarizations {
        Polarizations {
            plus: indices.iter().map(|&i| self.plus[i]).collect(),
            cross: indices.iter().map(|&i| self.cross[i]).collect(),
        }
    }
}

/// Frequency-domain source model.
pub trait FrequencyDomainSource: Send + Sync {
    /// Model name (for logs and errors).
    fn name(&self) -> &str;

    /// Polarizations at `frequencies`. Must return one value per frequency.
    fn polarizations(&self, frequencies: &[f64], params: &Parameters) -> Result<Polarizations>;
}

/// Evaluates a source on the dense grid or on an explicit frequency subset.
///
/// Output is zeroed outside `[minimum_frequency, maximum_frequency]`, the
/// band in which the source is trusted.
#[derive(Clone)]
pub struct WaveformGenerator {
    grid: FrequencyGrid,
    source: Arc<dyn FrequencyDomainSource>,
    minimum_frequency: f64,
    maximum_frequency: f64,
}

impl fmt::Debug for WaveformGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformGenerator")
            .field("source", &self.source.name())
            .field("sampling_frequency", &self.grid.sampling_frequency())
            .field("duration", &self.grid.duration())
            .field("minimum_frequency", &self.minimum_frequency)
            .field("maximum_frequency", &self.maximum_frequency)
            .finish()
    }
}

impl WaveformGenerator {
    /// Generator over the full grid bandwidth.
    pub fn new(grid: FrequencyGrid, source: Arc<dyn FrequencyDomainSource>) -> Self {
        let maximum_frequency = grid.sampling_frequency() / 2.0;
        Self { grid, source, minimum_frequency: 0.0, maximum_frequency }
    }

    /// Restrict the band in which the source output is kept.
    pub fn with_frequency_range(mut self, minimum_frequency: f64, maximum_frequency: f64) -> Self {
        self.minimum_frequency = minimum_frequency;
        self.maximum_frequency = maximum_frequency;
        self
    }

    /// Dense grid.
    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    /// Segment duration, s.
    pub fn duration(&self) -> f64 {
        self.grid.duration()
    }

    /// Sampling frequency, Hz.
    pub fn sampling_frequency(&self) -> f64 {
        self.grid.sampling_frequency()
    }

    /// Lower edge of the trusted band, Hz.
    pub fn minimum_frequency(&self) -> f64 {
        self.minimum_frequency
    }

    /// Source model name.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Polarizations on every grid point.
    pub fn frequency_domain_strain(&self, params: &Parameters) -> Result<Polarizations> {
        self.strain_at(self.grid.frequencies(), params)
    }

    /// Polarizations at exactly `frequencies`; the result has
    /// `frequencies.len()` samples per mode or this returns a shape error.
    pub fn strain_at(&self, frequencies: &[f64], params: &Parameters) -> Result<Polarizations> {
        let mut pols = self.source.polarizations(frequencies, params)?;
        pols.ensure_len(&format!("waveform source '{}'", self.source.name()), frequencies.len())?;

        let zero = Complex64::new(0.0, 0.0);
        for (k, &f) in frequencies.iter().enumerate() {
            if f < self.minimum_frequency || f > self.maximum_frequency {
                pols.plus[k] = zero;
                pols.cross[k] = zero;
            }
        }
        Ok(pols)
    }
}

//! Dense frequency grid.

use rb_core::{Error, Result};

/// One-sided frequency grid `f_k = k / T`, `k = 0..=floor(T * fs / 2)`, with a
/// mask selecting the analysis band `[minimum_frequency, maximum_frequency]`.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    sampling_frequency: f64,
    duration: f64,
    minimum_frequency: f64,
    maximum_frequency: f64,
    frequencies: Vec<f64>,
    mask: Vec<bool>,
    first_valid: usize,
    last_valid: usize,
}

impl FrequencyGrid {
    /// Build the grid and its mask.
    ///
    /// Fails with [`Error::Configuration`] for non-positive rate/duration, an
    /// inverted band, a non-integer number of samples, or a band that selects
    /// no grid point.
    pub fn new(
        sampling_frequency: f64,
        duration: f64,
        minimum_frequency: f64,
        maximum_frequency: f64,
    ) -> Result<Self> {
        if !(sampling_frequency.is_finite() && sampling_frequency > 0.0) {
            return Err(Error::Configuration(format!(
                "sampling frequency must be > 0, got {sampling_frequency}"
            )));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(Error::Configuration(format!("duration must be > 0, got {duration}")));
        }
        if !(minimum_frequency < maximum_frequency) {
            return Err(Error::Configuration(format!(
                "minimum frequency {minimum_frequency} must be below maximum frequency {maximum_frequency}"
            )));
        }
        let n_samples = duration * sampling_frequency;
        if (n_samples - n_samples.round()).abs() > 1e-6 {
            return Err(Error::Configuration(format!(
                "duration * sampling_frequency must be an integer, got {n_samples}"
            )));
        }
        let n_freq = n_samples.round() as usize / 2 + 1;
        let frequencies: Vec<f64> = (0..n_freq).map(|k| k as f64 / duration).collect();
        let mask: Vec<bool> =
            frequencies.iter().map(|&f| f >= minimum_frequency && f <= maximum_frequency).collect();

        let first_valid = mask.iter().position(|&m| m);
        let last_valid = mask.iter().rposition(|&m| m);
        let (first_valid, last_valid) = match (first_valid, last_valid) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(Error::Configuration(format!(
                    "frequency band [{minimum_frequency}, {maximum_frequency}] Hz selects no grid point \
                     (grid spans 0..={} Hz)",
                    frequencies.last().copied().unwrap_or(0.0)
                )));
            }
        };

        Ok(Self {
            sampling_frequency,
            duration,
            minimum_frequency,
            maximum_frequency,
            frequencies,
            mask,
            first_valid,
            last_valid,
        })
    }

    /// Sampling frequency, Hz.
    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    /// Segment duration, s.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Lower edge of the analysis band, Hz.
    pub fn minimum_frequency(&self) -> f64 {
        self.minimum_frequency
    }

    /// Upper edge of the analysis band, Hz.
    pub fn maximum_frequency(&self) -> f64 {
        self.maximum_frequency
    }

    /// Grid spacing `1 / T`.
    pub fn delta_f(&self) -> f64 {
        1.0 / self.duration
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Always `false` for a constructed grid.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Grid frequencies.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Analysis-band mask.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// First and last masked indices (inclusive).
    pub fn valid_range(&self) -> (usize, usize) {
        (self.first_valid, self.last_valid)
    }

    /// Number of masked points.
    pub fn n_valid(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Masked indices.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask.iter().enumerate().filter(|(_, m)| **m).map(|(i, _)| i)
    }

    /// First grid index with `f >= frequency`, if any.
    pub fn index_at_or_above(&self, frequency: f64) -> Option<usize> {
        let i = self.frequencies.partition_point(|&f| f < frequency);
        (i < self.frequencies.len()).then_some(i)
    }

    /// Same sampling rate and duration as `other`.
    pub fn same_sampling(&self, other: &FrequencyGrid) -> bool {
        self.sampling_frequency == other.sampling_frequency && self.duration == other.duration
    }

    /// Fail unless the sampling rate and duration match `(sampling_frequency, duration)`.
    pub fn check_sampling(&self, sampling_frequency: f64, duration: f64, what: &str) -> Result<()> {
        if self.sampling_frequency != sampling_frequency || self.duration != duration {
            return Err(Error::Configuration(format!(
                "{what}: sampling frequency/duration {sampling_frequency} Hz / {duration} s do not match \
                 the grid ({} Hz / {} s)",
                self.sampling_frequency, self.duration
            )));
        }
        Ok(())
    }
}

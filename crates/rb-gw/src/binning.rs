//! Bin-edge selection from a post-Newtonian phase-difference bound.
//!
//! The bins are chosen so that, for any waveform whose phase differs from the
//! fiducial one by a combination of the PN power laws `f^γ` with a total
//! dephasing of at most `chi` cycles over the band, the dephasing across a
//! single bin stays below `epsilon`.

use crate::grid::FrequencyGrid;
use rb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Range;

/// Frequency powers of the leading post-Newtonian phase terms.
const PN_POWERS: [f64; 5] = [-5.0 / 3.0, -2.0 / 3.0, 1.0, 5.0 / 3.0, 7.0 / 3.0];

/// Resolution of the dephasing curve used to place edges.
const PHASE_SAMPLES: usize = 50_000;

/// Bin-edge selection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Lowest frequency considered for bin edges, Hz.
    pub min_bin_frequency: f64,
    /// Highest frequency considered for bin edges, Hz.
    pub max_bin_frequency: f64,
    /// Tunable dephasing scale.
    pub chi: f64,
    /// Allowed dephasing per bin.
    pub epsilon: f64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self { min_bin_frequency: 20.0, max_bin_frequency: 1024.0, chi: 1.0, epsilon: 0.5 }
    }
}

impl BinningConfig {
    /// Reject non-finite or non-positive `chi`/`epsilon` and an inverted range.
    pub fn validate(&self) -> Result<()> {
        if !(self.chi.is_finite() && self.chi > 0.0) {
            return Err(Error::Configuration(format!("chi must be > 0, got {}", self.chi)));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::Configuration(format!("epsilon must be > 0, got {}", self.epsilon)));
        }
        if !(self.min_bin_frequency < self.max_bin_frequency) {
            return Err(Error::Configuration(format!(
                "bin frequency range [{}, {}] Hz is empty",
                self.min_bin_frequency, self.max_bin_frequency
            )));
        }
        Ok(())
    }
}

/// Strictly increasing grid indices at which waveforms are evaluated exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    indices: Vec<usize>,
    frequencies: Vec<f64>,
}

impl BinEdges {
    /// Place edges on `grid` according to `config`.
    pub fn from_grid(grid: &FrequencyGrid, config: &BinningConfig) -> Result<Self> {
        config.validate()?;

        let (first, last) = grid.valid_range();
        let freqs = grid.frequencies();
        let f_lo = config.min_bin_frequency.max(freqs[first]);
        let f_hi = config.max_bin_frequency.min(freqs[last]);
        if !(f_lo < f_hi) {
            return Err(Error::Configuration(format!(
                "bin frequency range [{}, {}] Hz does not overlap the analysis band [{}, {}] Hz",
                config.min_bin_frequency, config.max_bin_frequency, freqs[first], freqs[last]
            )));
        }

        let dephasing = dephasing_curve(f_lo, f_hi, config.chi);
        let total = dephasing[PHASE_SAMPLES - 1];
        // More bins than grid intervals would only produce duplicate edges.
        let n_bins = ((total / config.epsilon).floor() as usize).min(last - first).max(1);
        let step = (f_hi - f_lo) / (PHASE_SAMPLES - 1) as f64;

        let mut indices = Vec::with_capacity(n_bins + 1);
        for i in 0..=n_bins {
            let target = i as f64 / n_bins as f64 * total;
            let j = dephasing.partition_point(|&d| d < target).min(PHASE_SAMPLES - 1);
            let edge_frequency = f_lo + j as f64 * step;
            let index = grid.index_at_or_above(edge_frequency).unwrap_or(last).clamp(first, last);
            indices.push(index);
        }
        indices[0] = first;
        indices[n_bins] = last;
        indices.dedup();

        let edges = Self::from_indices(grid, indices)?;
        log::info!(
            "bin setup: {} bins between {:.2} and {:.2} Hz (chi = {}, epsilon = {})",
            edges.n_bins(),
            f_lo,
            f_hi,
            config.chi,
            config.epsilon
        );
        Ok(edges)
    }

    /// Wrap explicit edge indices.
    ///
    /// Indices must be strictly increasing, inside the grid's valid range,
    /// and at least two.
    pub fn from_indices(grid: &FrequencyGrid, indices: Vec<usize>) -> Result<Self> {
        if indices.len() < 2 {
            return Err(Error::Configuration(format!(
                "relative binning needs at least two bin edges, got {}",
                indices.len()
            )));
        }
        let (first, last) = grid.valid_range();
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Validation("bin edges must be strictly increasing".into()));
        }
        if indices[0] < first || indices[indices.len() - 1] > last {
            return Err(Error::Validation(format!(
                "bin edges must lie within grid indices [{first}, {last}]"
            )));
        }
        let frequencies = indices.iter().map(|&i| grid.frequencies()[i]).collect();
        Ok(Self { indices, frequencies })
    }

    /// Check that these edges address `grid`: every index inside its valid
    /// range and every edge frequency equal to the grid's.
    pub fn check_grid(&self, grid: &FrequencyGrid) -> Result<()> {
        let (first, last) = grid.valid_range();
        if let Some(&i) = self.indices.iter().find(|&&i| i < first || i > last) {
            return Err(Error::Configuration(format!(
                "bin edge index {i} lies outside grid indices [{first}, {last}]"
            )));
        }
        let freqs = grid.frequencies();
        for (&i, &f) in self.indices.iter().zip(&self.frequencies) {
            if (freqs[i] - f).abs() > 1e-9 * f.abs().max(1.0) {
                return Err(Error::Configuration(format!(
                    "bin edge at {f} Hz does not match grid frequency {} Hz at index {i}",
                    freqs[i]
                )));
            }
        }
        Ok(())
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Never `true` for constructed edges.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of bins (`len() - 1`).
    pub fn n_bins(&self) -> usize {
        self.indices.len() - 1
    }

    /// Grid indices of the edges.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Frequencies of the edges, Hz.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Grid indices covered by bin `b`: `[e_b, e_{b+1})`, with the closing
    /// edge included for the last bin.
    pub fn bin_range(&self, b: usize) -> Range<usize> {
        let end = if b + 1 == self.n_bins() { self.indices[b + 1] + 1 } else { self.indices[b + 1] };
        self.indices[b]..end
    }

    /// Centre frequency of bin `b`.
    pub fn bin_center(&self, b: usize) -> f64 {
        0.5 * (self.frequencies[b] + self.frequencies[b + 1])
    }
}

/// Worst-case dephasing `Δφ(f) - Δφ(f_lo)` on `PHASE_SAMPLES` points over `[f_lo, f_hi]`.
fn dephasing_curve(f_lo: f64, f_hi: f64, chi: f64) -> Vec<f64> {
    let coefficients: Vec<f64> = PN_POWERS
        .iter()
        .map(|&g| {
            let reference = if g < 0.0 { f_lo.powf(g) } else { f_hi.powf(g) };
            g.signum() * chi * 2.0 * PI / reference
        })
        .collect();
    let phase = |f: f64| -> f64 {
        PN_POWERS.iter().zip(&coefficients).map(|(&g, &c)| c * f.powf(g)).sum()
    };
    let start = phase(f_lo);
    let step = (f_hi - f_lo) / (PHASE_SAMPLES - 1) as f64;
    (0..PHASE_SAMPLES).map(|j| phase(f_lo + j as f64 * step) - start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> FrequencyGrid {
        FrequencyGrid::new(2048.0, 8.0, 20.0, 800.0).unwrap()
    }

    #[test]
    fn test_edges_strictly_increasing_and_span_band() {
        let grid = grid();
        let edges = BinEdges::from_grid(&grid, &BinningConfig::default()).unwrap();
        let (first, last) = grid.valid_range();
        assert!(edges.len() >= 2);
        assert!(edges.indices().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(edges.indices()[0], first);
        assert_eq!(*edges.indices().last().unwrap(), last);
        assert_eq!(edges.frequencies()[0], grid.frequencies()[first]);
    }

    #[test]
    fn test_dephasing_curve_monotonic() {
        let d = dephasing_curve(20.0, 800.0, 1.0);
        assert_eq!(d[0], 0.0);
        assert!(d.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_smaller_epsilon_gives_more_bins() {
        let grid = grid();
        let coarse = BinEdges::from_grid(&grid, &BinningConfig { epsilon: 1.0, ..Default::default() })
            .unwrap();
        let fine = BinEdges::from_grid(&grid, &BinningConfig { epsilon: 0.1, ..Default::default() })
            .unwrap();
        assert!(fine.n_bins() > coarse.n_bins());
    }

    #[test]
    fn test_bin_ranges_cover_band_exactly_once() {
        let grid = grid();
        let edges = BinEdges::from_grid(&grid, &BinningConfig::default()).unwrap();
        let (first, last) = grid.valid_range();
        let covered: usize = (0..edges.n_bins()).map(|b| edges.bin_range(b).len()).sum();
        assert_eq!(covered, last - first + 1);
        for b in 1..edges.n_bins() {
            assert_eq!(edges.bin_range(b - 1).end, edges.bin_range(b).start);
        }
    }

    #[test]
    fn test_invalid_config() {
        let grid = grid();
        for bad in [
            BinningConfig { chi: 0.0, ..Default::default() },
            BinningConfig { epsilon: f64::NAN, ..Default::default() },
            BinningConfig { min_bin_frequency: 900.0, max_bin_frequency: 1000.0, ..Default::default() },
        ] {
            let err = BinEdges::from_grid(&grid, &bad).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{err}");
        }
    }

    #[test]
    fn test_huge_epsilon_still_gives_one_bin() {
        let grid = grid();
        let edges =
            BinEdges::from_grid(&grid, &BinningConfig { epsilon: 1e9, ..Default::default() }).unwrap();
        assert_eq!(edges.n_bins(), 1);
    }

    #[test]
    fn test_tiny_epsilon_is_capped_at_grid_resolution() {
        let grid = grid();
        let cfg = BinningConfig { epsilon: 1e-300, ..Default::default() };
        assert!(cfg.validate().is_ok());
        let edges = BinEdges::from_grid(&grid, &cfg).unwrap();
        let (first, last) = grid.valid_range();
        assert!(edges.len() <= grid.n_valid());
        assert!(edges.indices().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(edges.indices()[0], first);
        assert_eq!(edges.indices()[edges.len() - 1], last);
    }

    #[test]
    fn test_check_grid() {
        let grid = grid();
        let edges = BinEdges::from_grid(&grid, &BinningConfig::default()).unwrap();
        edges.check_grid(&grid).unwrap();

        let longer = FrequencyGrid::new(4096.0, 32.0, 20.0, 800.0).unwrap();
        let foreign = BinEdges::from_grid(&longer, &BinningConfig::default()).unwrap();
        assert!(matches!(foreign.check_grid(&grid), Err(Error::Configuration(_))));

        // Same indices, different spacing.
        let coarse = FrequencyGrid::new(2048.0, 4.0, 10.0, 900.0).unwrap();
        let shifted = BinEdges::from_indices(&coarse, vec![160, 2000]).unwrap();
        assert!(matches!(shifted.check_grid(&grid), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_single_point_band_has_too_few_edges() {
        let grid = FrequencyGrid::new(64.0, 4.0, 9.9, 10.1).unwrap();
        let err = BinEdges::from_grid(&grid, &BinningConfig { min_bin_frequency: 1.0, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn test_from_indices_validation() {
        let grid = grid();
        let (first, last) = grid.valid_range();
        assert!(BinEdges::from_indices(&grid, vec![first]).is_err());
        assert!(BinEdges::from_indices(&grid, vec![first, first]).is_err());
        assert!(BinEdges::from_indices(&grid, vec![first - 1, last]).is_err());
        let edges = BinEdges::from_indices(&grid, vec![first, first + 10, last]).unwrap();
        assert_eq!(edges.n_bins(), 2);
        assert_eq!(edges.bin_range(1), first + 10..last + 1);
    }
}

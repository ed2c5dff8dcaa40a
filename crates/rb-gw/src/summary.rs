//! Per-bin summary data.

use crate::binning::BinEdges;
use crate::detector::Interferometer;
use rb_core::error::ensure_len;
use rb_core::{CalculatedSnrs, Complex64, Result};

/// First-order moments of the data/fiducial overlap and of the fiducial power
/// in each bin, for one detector.
///
/// With `h0` the fiducial detector response, `d` the data and `S` the PSD,
/// summed over the band points of bin `b`:
/// `a0 = 4/T Σ d conj(h0)/S`, `a1 = 4/T Σ d conj(h0)/S (f - f_m)`,
/// `b0 = 4/T Σ |h0|²/S`, `b1 = 4/T Σ |h0|²/S (f - f_m)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryData {
    /// Zeroth moment of `d conj(h0) / S`.
    pub a0: Vec<Complex64>,
    /// First moment of `d conj(h0) / S`.
    pub a1: Vec<Complex64>,
    /// Zeroth moment of `|h0|² / S`.
    pub b0: Vec<f64>,
    /// First moment of `|h0|² / S`.
    pub b1: Vec<f64>,
}

impl SummaryData {
    /// Summaries of `fiducial_response` (dense grid) against `ifo`'s data.
    pub fn compute(
        ifo: &Interferometer,
        fiducial_response: &[Complex64],
        edges: &BinEdges,
    ) -> Result<Self> {
        let grid = ifo.grid();
        ensure_len(&format!("{} fiducial response", ifo.name()), grid.len(), fiducial_response.len())?;
        let freqs = grid.frequencies();
        let mask = grid.mask();
        let (strain, psd) = (ifo.strain(), ifo.psd());
        let scale = 4.0 / ifo.duration();

        let n_bins = edges.n_bins();
        let mut summary = Self {
            a0: Vec::with_capacity(n_bins),
            a1: Vec::with_capacity(n_bins),
            b0: Vec::with_capacity(n_bins),
            b1: Vec::with_capacity(n_bins),
        };
        for b in 0..n_bins {
            let f_m = edges.bin_center(b);
            let (mut a0, mut a1) = (Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0));
            let (mut b0, mut b1) = (0.0, 0.0);
            for k in edges.bin_range(b).filter(|&k| mask[k]) {
                let h0 = fiducial_response[k];
                let overlap = strain[k] * h0.conj() / psd[k];
                let power = h0.norm_sqr() / psd[k];
                let df = freqs[k] - f_m;
                a0 += overlap;
                a1 += overlap * df;
                b0 += power;
                b1 += power * df;
            }
            summary.a0.push(a0 * scale);
            summary.a1.push(a1 * scale);
            summary.b0.push(b0 * scale);
            summary.b1.push(b1 * scale);
        }
        Ok(summary)
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.a0.len()
    }

    /// `<d, h>` and `<h, h>` from the per-bin ratio coefficients
    /// `r0 = (r_b + r_{b+1}) / 2` and `r1 = (r_{b+1} - r_b) / (f_{b+1} - f_b)`.
    pub fn calculate_snrs(&self, r0: &[Complex64], r1: &[Complex64]) -> Result<CalculatedSnrs> {
        ensure_len("summary data vs r0", self.n_bins(), r0.len())?;
        ensure_len("summary data vs r1", self.n_bins(), r1.len())?;
        let mut d_inner_h = Complex64::new(0.0, 0.0);
        let mut optimal_snr_squared = 0.0;
        for b in 0..self.n_bins() {
            d_inner_h += self.a0[b] * r0[b].conj() + self.a1[b] * r1[b].conj();
            optimal_snr_squared +=
                self.b0[b] * r0[b].norm_sqr() + 2.0 * self.b1[b] * (r0[b] * r1[b].conj()).re;
        }
        Ok(CalculatedSnrs { d_inner_h, optimal_snr_squared })
    }
}

/// Per-bin interpolation coefficients from edge ratios.
pub fn ratio_coefficients(ratios: &[Complex64], edge_frequencies: &[f64]) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
    ensure_len("edge ratios", edge_frequencies.len(), ratios.len())?;
    let r0 = ratios.windows(2).map(|w| (w[0] + w[1]) * 0.5).collect();
    let r1 = ratios
        .windows(2)
        .zip(edge_frequencies.windows(2))
        .map(|(r, f)| (r[1] - r[0]) / (f[1] - f[0]))
        .collect();
    Ok((r0, r1))
}

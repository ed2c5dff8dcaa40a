//! Relative-binning likelihood.
//!
//! The trial waveform is evaluated only at the bin edges. Its ratio to the
//! cached fiducial response is interpolated linearly inside each bin, and
//! the per-bin summary data turn the inner products into O(bins) sums.
//!
//! The fiducial cache is an immutable [`FiducialSnapshot`] behind an
//! `RwLock<Arc<_>>`: evaluations clone the `Arc` and run lock-free, while
//! [`RelativeBinningLikelihood::set_fiducial`] builds a complete new snapshot
//! before swapping it in.

use crate::binning::{BinEdges, BinningConfig};
use crate::detector::Interferometer;
use crate::fiducial::{DetectorFiducial, FiducialSnapshot};
use crate::summary::ratio_coefficients;
use crate::transient::GravitationalWaveTransient;
use crate::waveform::Polarizations;
use rb_core::error::ensure_len;
use rb_core::{CalculatedSnrs, Complex64, LogLikelihood, Parameters, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// What to do at an edge where the fiducial response vanishes but the trial
/// response does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateRatioPolicy {
    /// The sample gets log-likelihood `-inf`.
    #[default]
    RejectSample,
    /// The ratio is set to zero and the edge is ignored.
    ZeroRatio,
}

/// Relative-binning approximation of [`GravitationalWaveTransient`].
#[derive(Debug)]
pub struct RelativeBinningLikelihood {
    transient: GravitationalWaveTransient,
    edges: BinEdges,
    policy: DegenerateRatioPolicy,
    snapshot: RwLock<Arc<FiducialSnapshot>>,
    versions: AtomicU64,
}

impl RelativeBinningLikelihood {
    /// Place bin edges on the detectors' grid and build the first fiducial
    /// snapshot at `fiducial_parameters`.
    pub fn new(
        transient: GravitationalWaveTransient,
        binning: &BinningConfig,
        fiducial_parameters: &Parameters,
    ) -> Result<Self> {
        let grid = transient
            .interferometers()
            .first()
            .map(|ifo| ifo.grid())
            .unwrap_or_else(|| transient.generator().grid());
        let edges = BinEdges::from_grid(grid, binning)?;
        Self::with_edges(transient, edges, fiducial_parameters)
    }

    /// As [`RelativeBinningLikelihood::new`] with explicit edges, which must
    /// have been placed on the detectors' grid.
    pub fn with_edges(
        transient: GravitationalWaveTransient,
        edges: BinEdges,
        fiducial_parameters: &Parameters,
    ) -> Result<Self> {
        edges.check_grid(transient.generator().grid())?;
        for ifo in transient.interferometers() {
            edges.check_grid(ifo.grid())?;
        }
        let prepared = transient.prepare_parameters(fiducial_parameters);
        let snapshot = FiducialSnapshot::build(
            1,
            &prepared,
            transient.generator(),
            transient.interferometers(),
            &edges,
        )?;
        Ok(Self {
            transient,
            edges,
            policy: DegenerateRatioPolicy::default(),
            snapshot: RwLock::new(Arc::new(snapshot)),
            versions: AtomicU64::new(1),
        })
    }

    /// Set the degenerate-ratio policy.
    pub fn with_policy(mut self, policy: DegenerateRatioPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Degenerate-ratio policy.
    pub fn policy(&self) -> DegenerateRatioPolicy {
        self.policy
    }

    /// Bin edges.
    pub fn bin_edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Underlying dense likelihood.
    pub fn transient(&self) -> &GravitationalWaveTransient {
        &self.transient
    }

    /// Current fiducial snapshot.
    pub fn fiducial(&self) -> Arc<FiducialSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Rebuild the fiducial cache at `params` and publish it.
    ///
    /// Returns `false` (and keeps the current snapshot) when `params` equal
    /// the current reference parameters.
    pub fn set_fiducial(&self, params: &Parameters) -> Result<bool> {
        let prepared = self.transient.prepare_parameters(params);
        if self.fiducial().parameters() == &prepared {
            return Ok(false);
        }
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = FiducialSnapshot::build(
            version,
            &prepared,
            self.transient.generator(),
            self.transient.interferometers(),
            &self.edges,
        )?;
        let degenerate = snapshot.degenerate_edge_count();
        if degenerate > 0 {
            log::debug!("fiducial v{version}: {degenerate} degenerate edge responses");
        }
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if slot.version() < version {
            *slot = Arc::new(snapshot);
        }
        log::info!("fiducial waveform updated (version {})", slot.version());
        Ok(true)
    }

    /// Ratio of the trial to the fiducial detector response at each edge,
    /// or `None` when the degenerate-ratio policy rejects the sample.
    pub fn waveform_ratio(
        &self,
        snapshot: &FiducialSnapshot,
        ifo: &Interferometer,
        detector: &DetectorFiducial,
        trial: &Polarizations,
        params: &Parameters,
    ) -> Result<Option<Vec<Complex64>>> {
        let response = ifo.detector_response(trial, params, self.edges.frequencies())?;
        ensure_len(
            &format!("{} trial vs fiducial edge response", ifo.name()),
            detector.edge_response.len(),
            response.len(),
        )?;
        edge_ratios(&response, &detector.edge_response, snapshot.degeneracy_threshold(), self.policy)
    }

    /// Approximate inner products summed over detectors, or `None` for a
    /// rejected sample.
    pub fn calculate_snrs(&self, params: &Parameters) -> Result<Option<CalculatedSnrs>> {
        let snapshot = self.fiducial();
        let prepared = self.transient.prepare_parameters(params);
        let trial = self.transient.generator().strain_at(self.edges.frequencies(), &prepared)?;
        trial.ensure_len("trial waveform at bin edges", self.edges.len())?;

        let mut total = CalculatedSnrs::ZERO;
        for (ifo, detector) in self.transient.interferometers().iter().zip(snapshot.detectors()) {
            let Some(ratios) = self.waveform_ratio(&snapshot, ifo, detector, &trial, &prepared)? else {
                return Ok(None);
            };
            let (r0, r1) = ratio_coefficients(&ratios, self.edges.frequencies())?;
            total = total + detector.summary.calculate_snrs(&r0, &r1)?;
        }
        Ok(Some(total))
    }

    /// Dense-grid log-likelihood ratio at `params`, for validation.
    pub fn log_likelihood_ratio_full(&self, params: &Parameters) -> Result<f64> {
        self.transient.log_likelihood_ratio(params)
    }
}

impl LogLikelihood for RelativeBinningLikelihood {
    fn log_likelihood_ratio(&self, params: &Parameters) -> Result<f64> {
        Ok(match self.calculate_snrs(params)? {
            Some(snrs) => self.transient.marginalization().log_likelihood_ratio(&snrs),
            None => f64::NEG_INFINITY,
        })
    }

    fn noise_log_likelihood(&self) -> Result<f64> {
        self.transient.noise_log_likelihood()
    }
}

/// Edge-wise `trial / fiducial` with an explicit policy for vanishing
/// fiducial values.
///
/// Edges where both responses are at or below `threshold` carry no signal in
/// either waveform; they take the ratio of the nearest well-defined edge so
/// the linear interpolation inside neighbouring bins is unaffected.
fn edge_ratios(
    trial: &[Complex64],
    fiducial: &[Complex64],
    threshold: f64,
    policy: DegenerateRatioPolicy,
) -> Result<Option<Vec<Complex64>>> {
    ensure_len("edge ratio", fiducial.len(), trial.len())?;
    let zero = Complex64::new(0.0, 0.0);
    let mut ratios: Vec<Option<Complex64>> = Vec::with_capacity(trial.len());
    let mut zeroed = 0usize;
    for (&h, &h0) in trial.iter().zip(fiducial) {
        if !(h.re.is_finite() && h.im.is_finite()) {
            return Ok(None);
        }
        if h0.norm() > threshold {
            ratios.push(Some(h / h0));
        } else if h.norm() <= threshold {
            ratios.push(None);
        } else {
            match policy {
                DegenerateRatioPolicy::RejectSample => return Ok(None),
                DegenerateRatioPolicy::ZeroRatio => {
                    zeroed += 1;
                    ratios.push(Some(zero));
                }
            }
        }
    }
    if zeroed > 0 {
        log::debug!("zero-ratio policy masked {zeroed} bin edges");
    }
    Ok(Some(fill_from_nearest(&ratios, zero)))
}

/// Replace `None` by the nearest `Some` (earlier index wins ties); `default`
/// if there is none.
fn fill_from_nearest(values: &[Option<Complex64>], default: Complex64) -> Vec<Complex64> {
    let n = values.len();
    let mut previous: Vec<Option<(usize, Complex64)>> = Vec::with_capacity(n);
    let mut last = None;
    for (i, v) in values.iter().enumerate() {
        if let Some(v) = v {
            last = Some((i, *v));
        }
        previous.push(last);
    }
    let mut next = None;
    let mut out = vec![default; n];
    for i in (0..n).rev() {
        if let Some(v) = values[i] {
            next = Some((i, v));
            out[i] = v;
            continue;
        }
        out[i] = match (previous[i], next) {
            (Some((p, pv)), Some((q, qv))) => {
                if i - p <= q - i {
                    pv
                } else {
                    qv
                }
            }
            (Some((_, pv)), None) => pv,
            (None, Some((_, qv))) => qv,
            (None, None) => default,
        };
    }
    out
}

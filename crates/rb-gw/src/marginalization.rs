//! Analytic phase and numerical distance marginalization.

use rb_core::{CalculatedSnrs, Error, Parameters, Result};
use rb_prob::math::{linspace, ln_i0, logsumexp, trapezoid_weights};
use rb_prob::{Prior, PriorDict};
use serde::{Deserialize, Serialize};

/// Nodes of the distance quadrature.
const DISTANCE_GRID_POINTS: usize = 1000;

/// Which parameters are integrated out of the likelihood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginalizationKind {
    /// `Re<d,h> - <h,h>/2`.
    #[default]
    None,
    /// Coalescence phase, analytically: `ln I0(|<d,h>|) - <h,h>/2`.
    Phase,
    /// Luminosity distance, on a fixed quadrature grid.
    Distance,
    /// Both.
    PhaseAndDistance,
}

impl MarginalizationKind {
    /// Phase is integrated out.
    pub fn phase(self) -> bool {
        matches!(self, MarginalizationKind::Phase | MarginalizationKind::PhaseAndDistance)
    }

    /// Distance is integrated out.
    pub fn distance(self) -> bool {
        matches!(self, MarginalizationKind::Distance | MarginalizationKind::PhaseAndDistance)
    }
}

#[derive(Debug, Clone)]
struct DistanceQuadrature {
    reference: f64,
    /// `D_ref / D` at each node.
    rho: Vec<f64>,
    /// Normalized log prior mass at each node.
    log_weights: Vec<f64>,
}

impl DistanceQuadrature {
    fn new(prior: &Prior) -> Result<Self> {
        if prior.is_fixed() {
            return Err(Error::Configuration(
                "distance marginalization needs a non-fixed luminosity_distance prior".into(),
            ));
        }
        let (lo, hi) = prior.bounds();
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0) {
            return Err(Error::Configuration(format!(
                "distance marginalization needs a bounded luminosity_distance prior with minimum > 0, \
                 got [{lo}, {hi}]"
            )));
        }
        let reference = prior.rescale(0.5)?;
        let distances = linspace(lo, hi, DISTANCE_GRID_POINTS);
        let mut log_weights: Vec<f64> = distances
            .iter()
            .zip(trapezoid_weights(&distances))
            .map(|(&d, w)| prior.ln_prob(d) + w.ln())
            .collect();
        let norm = logsumexp(&log_weights);
        if !norm.is_finite() {
            return Err(Error::Configuration("luminosity_distance prior has no mass".into()));
        }
        log_weights.iter_mut().for_each(|w| *w -= norm);
        let rho = distances.iter().map(|&d| reference / d).collect();
        Ok(Self { reference, rho, log_weights })
    }
}

/// Maps inner products to a (possibly marginalized) log-likelihood ratio.
#[derive(Debug, Clone, Default)]
pub struct Marginalization {
    kind: MarginalizationKind,
    distance: Option<DistanceQuadrature>,
}

impl Marginalization {
    /// No marginalization.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build the marginalization for `kind`, taking the needed priors from `priors`.
    ///
    /// Phase marginalization requires a `phase` prior and distance
    /// marginalization a bounded `luminosity_distance` prior.
    pub fn new(kind: MarginalizationKind, priors: &PriorDict) -> Result<Self> {
        if kind.phase() && priors.get("phase").is_none() {
            return Err(Error::Configuration("phase marginalization needs a 'phase' prior".into()));
        }
        let distance = if kind.distance() {
            let prior = priors.get("luminosity_distance").ok_or_else(|| {
                Error::Configuration("distance marginalization needs a 'luminosity_distance' prior".into())
            })?;
            let quadrature = DistanceQuadrature::new(prior)?;
            log::info!("distance marginalization: reference distance {:.2} Mpc", quadrature.reference);
            Some(quadrature)
        } else {
            None
        };
        Ok(Self { kind, distance })
    }

    /// Configured kind.
    pub fn kind(&self) -> MarginalizationKind {
        self.kind
    }

    /// Distance at which waveforms are evaluated under distance marginalization.
    pub fn reference_distance(&self) -> Option<f64> {
        self.distance.as_ref().map(|d| d.reference)
    }

    /// Pin the marginalized parameters to their reference values
    /// (`phase = 0`, `luminosity_distance = D_ref`).
    pub fn prepare_parameters(&self, params: &mut Parameters) {
        if self.kind.phase() {
            params.insert("phase".into(), 0.0);
        }
        if let Some(d) = &self.distance {
            params.insert("luminosity_distance".into(), d.reference);
        }
    }

    /// `priors` with the marginalized keys fixed, so samplers do not search them.
    pub fn marginalized_priors(&self, priors: &PriorDict) -> PriorDict {
        let mut out = priors.clone();
        if self.kind.phase() {
            out.insert("phase", Prior::DeltaFunction { peak: 0.0 });
        }
        if let Some(d) = &self.distance {
            out.insert("luminosity_distance", Prior::DeltaFunction { peak: d.reference });
        }
        out
    }

    /// Log-likelihood ratio from inner products computed at the prepared
    /// parameters.
    pub fn log_likelihood_ratio(&self, snrs: &CalculatedSnrs) -> f64 {
        let dh = snrs.d_inner_h;
        let hh = snrs.optimal_snr_squared;
        match &self.distance {
            None => {
                if self.kind.phase() {
                    ln_i0(dh.norm()) - 0.5 * hh
                } else {
                    dh.re - 0.5 * hh
                }
            }
            Some(q) => {
                let terms: Vec<f64> = q
                    .rho
                    .iter()
                    .zip(&q.log_weights)
                    .map(|(&rho, &lw)| {
                        let overlap = if self.kind.phase() { ln_i0(rho * dh.norm()) } else { rho * dh.re };
                        overlap - 0.5 * rho * rho * hh + lw
                    })
                    .collect();
                logsumexp(&terms)
            }
        }
    }
}

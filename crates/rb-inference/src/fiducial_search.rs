//! Iterative search for a fiducial waveform near the maximum likelihood.
//!
//! Each iteration maximizes the relative-binning likelihood ratio with
//! differential evolution, then moves the fiducial to the optimum. The
//! approximation is exact at its own fiducial, so the loop stops once the
//! optimum stops improving.

use crate::differential_evolution::{DifferentialEvolution, DifferentialEvolutionConfig};
use crate::optimizer::{NelderMeadOptimizer, ObjectiveFunction, OptimizerConfig};
use rb_core::{Error, LogLikelihood, Parameters, Result};
use rb_gw::RelativeBinningLikelihood;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fiducial search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialSearchConfig {
    /// Maximum number of optimize/re-fiducialize rounds.
    pub max_iterations: usize,
    /// Stop when the optimum changes by less than this (in log-likelihood).
    pub likelihood_threshold: f64,
    /// Global optimizer settings. The seed is offset by the iteration index.
    pub differential_evolution: DifferentialEvolutionConfig,
    /// Refine each optimum with Nelder–Mead.
    pub polish: bool,
}

impl Default for FiducialSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            likelihood_threshold: 1.0,
            differential_evolution: DifferentialEvolutionConfig::default(),
            polish: false,
        }
    }
}

/// Why the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Successive optima agreed within the threshold.
    ThresholdReached,
    /// `max_iterations` rounds were run.
    MaxIterationsReached,
}

/// One optimize/re-fiducialize round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStep {
    /// Zero-based round.
    pub iteration: usize,
    /// Relative-binning log-likelihood ratio at the optimum, before moving
    /// the fiducial there.
    pub log_likelihood_ratio: f64,
    /// Dense-grid log-likelihood ratio at the optimum.
    pub full_log_likelihood_ratio: f64,
    /// Objective evaluations used.
    pub n_evaluations: usize,
}

/// Outcome of [`search_fiducial`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiducialSearchResult {
    /// Final fiducial parameters.
    pub parameters: Parameters,
    /// Relative-binning log-likelihood ratio at the final fiducial.
    pub log_likelihood_ratio: f64,
    /// Dense-grid log-likelihood ratio at the final fiducial.
    pub full_log_likelihood_ratio: f64,
    /// Why the loop ended.
    pub stop_reason: StopReason,
    /// Per-round record.
    pub history: Vec<SearchStep>,
    /// Fiducial snapshot version after the search.
    pub fiducial_version: u64,
}

/// Negative log-likelihood ratio over the searched keys.
struct NegativeLogLikelihoodRatio<'a> {
    likelihood: &'a RelativeBinningLikelihood,
    base: &'a Parameters,
    keys: Vec<&'a String>,
}

impl NegativeLogLikelihoodRatio<'_> {
    fn parameters(&self, values: &[f64]) -> Parameters {
        let mut params = self.base.clone();
        for (key, &value) in self.keys.iter().zip(values) {
            params.insert((*key).clone(), value);
        }
        params
    }
}

impl ObjectiveFunction for NegativeLogLikelihoodRatio<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        Ok(-self.likelihood.log_likelihood_ratio(&self.parameters(params))?)
    }
}

/// Move the fiducial of `likelihood` towards the maximum-likelihood point.
///
/// `initial` must hold every waveform and extrinsic parameter; keys in
/// `bounds` are searched, the rest stay at their initial values.
pub fn search_fiducial(
    likelihood: &RelativeBinningLikelihood,
    initial: &Parameters,
    bounds: &BTreeMap<String, (f64, f64)>,
    config: &FiducialSearchConfig,
) -> Result<FiducialSearchResult> {
    if config.max_iterations == 0 {
        return Err(Error::Validation("fiducial search needs max_iterations > 0".into()));
    }
    if !(config.likelihood_threshold > 0.0) {
        return Err(Error::Validation(format!(
            "likelihood_threshold must be > 0, got {}",
            config.likelihood_threshold
        )));
    }
    if let Some(key) = bounds.keys().find(|k| !initial.contains_key(*k)) {
        return Err(Error::Validation(format!("bounded parameter '{key}' has no initial value")));
    }

    likelihood.set_fiducial(initial)?;
    let objective =
        NegativeLogLikelihoodRatio { likelihood, base: initial, keys: bounds.keys().collect() };
    let box_bounds: Vec<(f64, f64)> = bounds.values().copied().collect();

    let mut history = Vec::with_capacity(config.max_iterations);
    let mut best = initial.clone();
    let mut previous = f64::NEG_INFINITY;
    let mut stop_reason = StopReason::MaxIterationsReached;

    for iteration in 0..config.max_iterations {
        let de_config = DifferentialEvolutionConfig {
            seed: config.differential_evolution.seed.wrapping_add(iteration as u64),
            ..config.differential_evolution.clone()
        };
        let mut optimum = DifferentialEvolution::new(de_config).minimize(&objective, &box_bounds)?;
        if config.polish {
            let polished = NelderMeadOptimizer::new(OptimizerConfig::default()).minimize(
                &objective,
                &optimum.parameters,
                &box_bounds,
            )?;
            optimum.n_fev += polished.n_fev;
            if polished.fval < optimum.fval {
                optimum.parameters = polished.parameters;
                optimum.fval = polished.fval;
            }
        }

        let log_likelihood_ratio = -optimum.fval;
        best = objective.parameters(&optimum.parameters);
        let full_log_likelihood_ratio = likelihood.log_likelihood_ratio_full(&best)?;
        log::info!(
            "fiducial search iteration {iteration}: approx ln L = {log_likelihood_ratio:.4}, \
             full ln L = {full_log_likelihood_ratio:.4} ({} evaluations)",
            optimum.n_fev
        );
        for (key, value) in bounds.keys().zip(&optimum.parameters) {
            log::debug!("  best fit {key} = {value}");
        }
        history.push(SearchStep {
            iteration,
            log_likelihood_ratio,
            full_log_likelihood_ratio,
            n_evaluations: optimum.n_fev,
        });

        likelihood.set_fiducial(&best)?;

        if (log_likelihood_ratio - previous).abs() < config.likelihood_threshold {
            stop_reason = StopReason::ThresholdReached;
            break;
        }
        previous = log_likelihood_ratio;
    }

    match stop_reason {
        StopReason::ThresholdReached => log::info!("likelihood change threshold reached, stopping"),
        StopReason::MaxIterationsReached => log::info!("max iterations reached, stopping"),
    }

    let log_likelihood_ratio = likelihood.log_likelihood_ratio(&best)?;
    let full_log_likelihood_ratio = likelihood.log_likelihood_ratio_full(&best)?;
    Ok(FiducialSearchResult {
        parameters: best,
        log_likelihood_ratio,
        full_log_likelihood_ratio,
        stop_reason,
        history,
        fiducial_version: likelihood.fiducial().version(),
    })
}

//! Nested sampling with constrained random-walk replacement.
//!
//! Live points live in the unit hypercube and are mapped to physical values
//! through [`PriorDict::rescale`]. Each iteration retires the worst live
//! point at prior volume `ln X_i = -i / n_live` and replaces it by a
//! Metropolis walk, started from another live point, that only accepts
//! moves above the retired likelihood.
//!
//! The sampler integrates the log-likelihood *ratio*; the noise
//! log-likelihood is added back to the reported evidence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use rb_core::{Error, LogLikelihood, Parameters, Result};
use rb_prob::math::log_add_exp;
use rb_prob::{Boundary, PriorDict};
use serde::{Deserialize, Serialize};

/// Walk acceptance rate the step scale is steered towards.
const TARGET_ACCEPTANCE: f64 = 0.5;

/// Nested sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedConfig {
    /// Number of live points.
    pub n_live: usize,
    /// Metropolis steps per replacement.
    pub walks: usize,
    /// Stop once the remaining live volume could change `ln Z` by less than this.
    pub dlogz: f64,
    /// Hard cap on retired points.
    pub max_iterations: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self { n_live: 250, walks: 25, dlogz: 0.1, max_iterations: 100_000, seed: 0 }
    }
}

impl NestedConfig {
    /// Reject settings the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.n_live < 2 {
            return Err(Error::Validation(format!("n_live must be >= 2, got {}", self.n_live)));
        }
        if self.walks == 0 || self.max_iterations == 0 {
            return Err(Error::Validation("walks and max_iterations must be > 0".into()));
        }
        if !(self.dlogz > 0.0) {
            return Err(Error::Validation(format!("dlogz must be > 0, got {}", self.dlogz)));
        }
        Ok(())
    }
}

/// A retired (or final live) point with its posterior weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedSample {
    /// Searched parameter values, in `search_keys` order.
    pub values: Vec<f64>,
    /// Log-likelihood ratio.
    pub log_likelihood_ratio: f64,
    /// Log posterior weight, normalized so the weights sum to one.
    pub log_weight: f64,
}

/// Outcome of a nested sampling run.
#[derive(Debug, Clone, Serialize)]
pub struct NestedResult {
    /// Names of the searched parameters.
    pub search_keys: Vec<String>,
    /// `ln Z` of the signal hypothesis (noise term included).
    pub log_evidence: f64,
    /// Statistical error on `ln Z`, `sqrt(H / n_live)`.
    pub log_evidence_err: f64,
    /// `ln Z` of the noise-only hypothesis.
    pub log_noise_evidence: f64,
    /// `ln Z - ln Z_noise`.
    pub log_bayes_factor: f64,
    /// Kullback–Leibler information `H` of posterior against prior, in nats.
    pub information: f64,
    /// Number of live points used.
    pub n_live: usize,
    /// Number of retired points.
    pub n_iterations: usize,
    /// Likelihood evaluations, initial draws included.
    pub n_likelihood_calls: usize,
    /// Retired points followed by the final live points.
    pub samples: Vec<WeightedSample>,
    /// Equal-weight posterior draws, in `search_keys` order.
    pub posterior: Vec<Vec<f64>>,
    /// Parameters of the highest-likelihood sample (fixed values included).
    pub max_likelihood_parameters: Parameters,
    /// Highest log-likelihood ratio seen.
    pub max_log_likelihood_ratio: f64,
}

impl NestedResult {
    /// Equal-weight posterior draws of one parameter.
    pub fn posterior_column(&self, key: &str) -> Option<Vec<f64>> {
        let k = self.search_keys.iter().position(|s| s == key)?;
        Some(self.posterior.iter().map(|row| row[k]).collect())
    }

    /// Kish effective sample size of the weighted samples.
    pub fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self.samples.iter().map(|s| (2.0 * s.log_weight).exp()).sum();
        if sum_sq > 0.0 { 1.0 / sum_sq } else { 0.0 }
    }
}

#[derive(Debug, Clone)]
struct LivePoint {
    unit: Vec<f64>,
    values: Vec<f64>,
    log_l: f64,
}

/// Running evidence and information (Skilling's recurrences).
struct Evidence {
    log_z: f64,
    information: f64,
}

impl Evidence {
    fn new() -> Self {
        Self { log_z: f64::NEG_INFINITY, information: 0.0 }
    }

    fn add(&mut self, log_weight: f64, log_l: f64) {
        if log_weight == f64::NEG_INFINITY {
            return;
        }
        let log_z = log_add_exp(self.log_z, log_weight);
        let carried = if self.log_z.is_finite() {
            (self.log_z - log_z).exp() * (self.information + self.log_z)
        } else {
            0.0
        };
        self.information = (log_weight - log_z).exp() * log_l + carried - log_z;
        self.log_z = log_z;
    }
}

/// Likelihood, priors and boundaries seen from the unit cube.
struct UnitProblem<'a, L: ?Sized> {
    likelihood: &'a L,
    priors: &'a PriorDict,
    boundaries: Vec<Option<Boundary>>,
}

impl<L: LogLikelihood + ?Sized> UnitProblem<'_, L> {
    fn point(&self, unit: Vec<f64>) -> Result<LivePoint> {
        let params = self.priors.rescale(&unit)?;
        let log_l = self.likelihood.log_likelihood_ratio(&params)?;
        let values = self.priors.to_vector(&params)?;
        Ok(LivePoint { unit, values, log_l: if log_l.is_nan() { f64::NEG_INFINITY } else { log_l } })
    }

    /// Fold `unit` back into the cube; `false` if a coordinate has no boundary.
    fn apply_boundaries(&self, unit: &mut [f64]) -> bool {
        for (u, boundary) in unit.iter_mut().zip(&self.boundaries) {
            if (0.0..1.0).contains(&*u) {
                continue;
            }
            match boundary {
                Some(Boundary::Periodic) => *u = u.rem_euclid(1.0),
                Some(Boundary::Reflective) => {
                    *u = if *u < 0.0 { -*u } else { 2.0 - *u };
                    if !(0.0..1.0).contains(&*u) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// `walks` Metropolis steps above `threshold`. Returns the end point,
    /// the number of accepted steps and the number of likelihood calls.
    fn walk(
        &self,
        start: &LivePoint,
        threshold: f64,
        steps: &[f64],
        walks: usize,
        rng: &mut StdRng,
    ) -> Result<(LivePoint, usize, usize)> {
        let mut current = start.clone();
        let (mut accepted, mut calls) = (0, 0);
        for _ in 0..walks {
            let mut proposal: Vec<f64> = current
                .unit
                .iter()
                .zip(steps)
                .map(|(&u, &s)| u + s * rng.sample::<f64, _>(StandardNormal))
                .collect();
            if !self.apply_boundaries(&mut proposal) {
                continue;
            }
            let candidate = self.point(proposal)?;
            calls += 1;
            if candidate.log_l > threshold {
                current = candidate;
                accepted += 1;
            }
        }
        Ok((current, accepted, calls))
    }
}

/// Per-axis spread of the live points in the unit cube.
fn live_spread(live: &[LivePoint], ndim: usize) -> Vec<f64> {
    let n = live.len() as f64;
    (0..ndim)
        .map(|k| {
            let mean = live.iter().map(|p| p.unit[k]).sum::<f64>() / n;
            let var = live.iter().map(|p| (p.unit[k] - mean).powi(2)).sum::<f64>() / n;
            var.sqrt().max(1e-6)
        })
        .collect()
}

fn extreme_index(live: &[LivePoint], worse: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, p) in live.iter().enumerate().skip(1) {
        if worse(p.log_l, live[best].log_l) {
            best = i;
        }
    }
    best
}

/// Run the nested sampler over the searched keys of `priors`.
pub fn run_nested<L: LogLikelihood + ?Sized>(
    likelihood: &L,
    priors: &PriorDict,
    config: &NestedConfig,
) -> Result<NestedResult> {
    config.validate()?;
    priors.validate()?;
    let ndim = priors.ndim();
    if ndim == 0 {
        return Err(Error::Validation("nested sampling needs at least one searched parameter".into()));
    }
    let problem = UnitProblem { likelihood, priors, boundaries: priors.boundaries() };
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n_live = config.n_live;

    let units: Vec<Vec<f64>> =
        (0..n_live).map(|_| (0..ndim).map(|_| rng.random::<f64>()).collect()).collect();
    let mut live: Vec<LivePoint> =
        units.into_par_iter().map(|u| problem.point(u)).collect::<Result<_>>()?;
    let mut n_calls = n_live;

    let log_noise_evidence = likelihood.noise_log_likelihood()?;
    let log_shrink = (-(-1.0 / n_live as f64).exp_m1()).ln();
    let mut evidence = Evidence::new();
    let mut dead: Vec<(LivePoint, f64)> = Vec::new();
    let mut log_vol = 0.0;
    let mut scale = 1.0;
    let mut iteration = 0;

    while iteration < config.max_iterations {
        let worst = extreme_index(&live, |a, b| a < b);
        let max_l = live[extreme_index(&live, |a, b| a > b)].log_l;
        let remaining = log_add_exp(evidence.log_z, max_l + log_vol) - evidence.log_z;
        if evidence.log_z.is_finite() && remaining < config.dlogz {
            break;
        }
        iteration += 1;

        let threshold = live[worst].log_l;
        let log_weight = log_vol + log_shrink + threshold;
        evidence.add(log_weight, threshold);

        let mut start = rng.random_range(0..n_live - 1);
        if start >= worst {
            start += 1;
        }
        let steps: Vec<f64> = live_spread(&live, ndim).into_iter().map(|s| scale * s).collect();
        let (replacement, accepted, calls) =
            problem.walk(&live[start], threshold, &steps, config.walks, &mut rng)?;
        n_calls += calls;
        let rate = accepted as f64 / config.walks as f64;
        scale = (scale * (2.0 * (rate - TARGET_ACCEPTANCE)).exp()).clamp(1e-4, 10.0);

        let retired = std::mem::replace(&mut live[worst], replacement);
        dead.push((retired, log_weight));
        log_vol = -(iteration as f64) / n_live as f64;

        if iteration % n_live == 0 {
            log::debug!(
                "nested iteration {iteration}: ln Z = {:.3}, dlogz = {remaining:.3}, \
                 acceptance = {rate:.2}, scale = {scale:.3}",
                evidence.log_z
            );
        }
    }
    if iteration == config.max_iterations {
        log::warn!("nested sampling stopped at max_iterations = {}", config.max_iterations);
    }

    live.sort_by(|a, b| a.log_l.total_cmp(&b.log_l));
    let final_log_width = log_vol - (n_live as f64).ln();
    for point in live {
        let log_weight = final_log_width + point.log_l;
        evidence.add(log_weight, point.log_l);
        dead.push((point, log_weight));
    }

    let log_z = evidence.log_z;
    if !log_z.is_finite() {
        return Err(Error::Computation("every likelihood evaluation was rejected".into()));
    }
    let information = evidence.information.max(0.0);

    let best = dead
        .iter()
        .max_by(|a, b| a.0.log_l.total_cmp(&b.0.log_l))
        .map(|(p, _)| p.unit.clone())
        .unwrap_or_default();
    let max_likelihood_parameters = priors.rescale(&best)?;

    let samples: Vec<WeightedSample> = dead
        .into_iter()
        .map(|(p, w)| WeightedSample {
            values: p.values,
            log_likelihood_ratio: p.log_l,
            log_weight: w - log_z,
        })
        .collect();
    let max_log_likelihood_ratio =
        samples.iter().map(|s| s.log_likelihood_ratio).fold(f64::NEG_INFINITY, f64::max);
    let max_weight = samples.iter().map(|s| s.log_weight).fold(f64::NEG_INFINITY, f64::max);
    let posterior: Vec<Vec<f64>> = samples
        .iter()
        .filter(|s| rng.random::<f64>() < (s.log_weight - max_weight).exp())
        .map(|s| s.values.clone())
        .collect();

    let result = NestedResult {
        search_keys: priors.search_keys(),
        log_evidence: log_z + log_noise_evidence,
        log_evidence_err: (information / n_live as f64).sqrt(),
        log_noise_evidence,
        log_bayes_factor: log_z,
        information,
        n_live,
        n_iterations: iteration,
        n_likelihood_calls: n_calls,
        samples,
        posterior,
        max_likelihood_parameters,
        max_log_likelihood_ratio,
    };
    log::info!(
        "nested sampling done: ln Z = {:.3} +/- {:.3}, ln BF = {:.3}, {} iterations, {} calls, \
         {} posterior samples",
        result.log_evidence,
        result.log_evidence_err,
        result.log_bayes_factor,
        result.n_iterations,
        result.n_likelihood_calls,
        result.posterior.len()
    );
    Ok(result)
}

/// Independent runs with seeds `config.seed + run_id`, in parallel.
pub fn run_nested_multi<L: LogLikelihood + ?Sized>(
    likelihood: &L,
    priors: &PriorDict,
    config: &NestedConfig,
    n_runs: usize,
) -> Result<Vec<NestedResult>> {
    if n_runs == 0 {
        return Err(Error::Validation("n_runs must be > 0".into()));
    }
    (0..n_runs)
        .into_par_iter()
        .map(|run_id| {
            let run_config =
                NestedConfig { seed: config.seed.wrapping_add(run_id as u64), ..config.clone() };
            run_nested(likelihood, priors, &run_config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rb_prob::Prior;

    #[test]
    fn test_evidence_of_constant_likelihood() {
        // Every weight is ln X_{i-1} - ln X_i + c, so Z sums to exactly e^c.
        let mut ev = Evidence::new();
        let n = 10.0_f64;
        let shrink = (-(-1.0 / n).exp_m1()).ln();
        let mut log_vol = 0.0;
        for i in 1..=50 {
            ev.add(log_vol + shrink + 2.0, 2.0);
            log_vol = -(i as f64) / n;
        }
        for _ in 0..10 {
            ev.add(log_vol - n.ln() + 2.0, 2.0);
        }
        assert_relative_eq!(ev.log_z, 2.0, epsilon = 1e-12);
        assert!(ev.information.abs() < 1e-9);
    }

    #[test]
    fn test_evidence_skips_rejected_points() {
        let mut ev = Evidence::new();
        ev.add(f64::NEG_INFINITY, f64::NEG_INFINITY);
        assert_eq!(ev.log_z, f64::NEG_INFINITY);
        assert_eq!(ev.information, 0.0);
        ev.add(-1.0, 0.5);
        assert_relative_eq!(ev.log_z, -1.0);
        assert!(ev.information.is_finite());
    }

    struct Flat;

    impl LogLikelihood for Flat {
        fn log_likelihood_ratio(&self, _params: &Parameters) -> Result<f64> {
            Ok(0.0)
        }

        fn noise_log_likelihood(&self) -> Result<f64> {
            Ok(0.0)
        }
    }

    fn periodic_and_reflective() -> PriorDict {
        let mut priors = PriorDict::new();
        priors.insert("a", Prior::periodic(0.0, 1.0));
        priors.insert("b", Prior::Uniform { minimum: 0.0, maximum: 1.0, boundary: Some(Boundary::Reflective) });
        priors.insert("c", Prior::uniform(0.0, 1.0));
        priors
    }

    #[test]
    fn test_boundaries() {
        let priors = periodic_and_reflective();
        let problem = UnitProblem { likelihood: &Flat, priors: &priors, boundaries: priors.boundaries() };

        let mut u = vec![1.25, -0.2, 0.5];
        assert!(problem.apply_boundaries(&mut u));
        assert_relative_eq!(u[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(u[1], 0.2, epsilon = 1e-12);

        let mut u = vec![0.5, 1.1, 0.5];
        assert!(problem.apply_boundaries(&mut u));
        assert_relative_eq!(u[1], 0.9, epsilon = 1e-12);

        // No boundary: the step is rejected.
        let mut u = vec![0.5, 0.5, 1.01];
        assert!(!problem.apply_boundaries(&mut u));
    }

    #[test]
    fn test_flat_likelihood_has_zero_log_evidence() {
        let mut priors = PriorDict::new();
        priors.insert("x", Prior::uniform(-1.0, 1.0));
        let config = NestedConfig { n_live: 50, walks: 5, max_iterations: 400, ..Default::default() };
        let r = run_nested(&Flat, &priors, &config).unwrap();
        assert_relative_eq!(r.log_evidence, 0.0, epsilon = 1e-9);
        assert!(r.information < 1e-6);
        assert_relative_eq!(
            r.samples.iter().map(|s| s.log_weight.exp()).sum::<f64>(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_invalid_config() {
        let mut priors = PriorDict::new();
        priors.insert("x", Prior::uniform(0.0, 1.0));
        for config in [
            NestedConfig { n_live: 1, ..Default::default() },
            NestedConfig { walks: 0, ..Default::default() },
            NestedConfig { dlogz: 0.0, ..Default::default() },
        ] {
            assert!(run_nested(&Flat, &priors, &config).is_err());
        }
        let fixed_only = PriorDict::new();
        assert!(run_nested(&Flat, &fixed_only, &NestedConfig::default()).is_err());
    }
}

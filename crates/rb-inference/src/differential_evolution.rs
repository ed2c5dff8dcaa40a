//! Differential evolution (`best1bin`) global minimizer.
//!
//! Works in the unit hypercube and maps to the bounds on evaluation.
//! Trial vectors of a generation are built sequentially from one seeded RNG
//! and then evaluated in parallel with rayon, so results depend only on the
//! seed and not on the number of threads.

use crate::optimizer::{
    NelderMeadOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig, PENALTY,
    check_bounds, finite_cost,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rb_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Differential evolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialEvolutionConfig {
    /// Maximum number of generations.
    pub max_generations: usize,
    /// Population size per parameter (total = `popsize * ndim`, at least 5).
    pub popsize: usize,
    /// Mutation factor, dithered uniformly in `[lo, hi)` each generation.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    /// Relative convergence tolerance on the population energy spread.
    pub tol: f64,
    /// Absolute convergence tolerance on the population energy spread.
    pub atol: f64,
    /// RNG seed.
    pub seed: u64,
    /// Polish the best member with Nelder–Mead.
    pub polish: bool,
}

impl Default for DifferentialEvolutionConfig {
    fn default() -> Self {
        Self {
            max_generations: 1000,
            popsize: 15,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            seed: 0,
            polish: false,
        }
    }
}

impl DifferentialEvolutionConfig {
    /// Reject settings that cannot drive the search.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.mutation;
        if !(0.0..=2.0).contains(&lo) || !(0.0..=2.0).contains(&hi) || lo > hi {
            return Err(Error::Validation(format!(
                "mutation must satisfy 0 <= lo <= hi <= 2, got {:?}",
                self.mutation
            )));
        }
        if !(0.0..=1.0).contains(&self.recombination) {
            return Err(Error::Validation(format!(
                "recombination must lie in [0, 1], got {}",
                self.recombination
            )));
        }
        if self.popsize == 0 || self.max_generations == 0 {
            return Err(Error::Validation("popsize and max_generations must be > 0".into()));
        }
        if !(self.tol >= 0.0 && self.atol >= 0.0) {
            return Err(Error::Validation("tol and atol must be >= 0".into()));
        }
        Ok(())
    }
}

/// Differential evolution minimizer.
#[derive(Debug, Clone, Default)]
pub struct DifferentialEvolution {
    config: DifferentialEvolutionConfig,
}

impl DifferentialEvolution {
    /// New minimizer.
    pub fn new(config: DifferentialEvolutionConfig) -> Self {
        Self { config }
    }

    /// Settings.
    pub fn config(&self) -> &DifferentialEvolutionConfig {
        &self.config
    }

    /// Minimize `objective` over the box `bounds`.
    ///
    /// Rejected samples (infinite or NaN cost) are kept in the population
    /// with cost [`PENALTY`]. Objective errors abort the search.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        self.config.validate()?;
        check_bounds(bounds)?;
        let ndim = bounds.len();
        let npop = (self.config.popsize * ndim).max(5);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let scale = |unit: &[f64]| -> Vec<f64> {
            unit.iter().zip(bounds).map(|(&u, &(lo, hi))| lo + u * (hi - lo)).collect()
        };
        let evaluate = |members: &[Vec<f64>]| -> Result<Vec<f64>> {
            members.par_iter().map(|u| objective.eval(&scale(u)).map(finite_cost)).collect()
        };

        let mut population = latin_hypercube(npop, ndim, &mut rng);
        let mut energies = evaluate(&population)?;
        let mut n_fev = npop;
        let mut best = best_index(&energies);

        let mut converged = false;
        let mut generation = 0;
        while generation < self.config.max_generations {
            generation += 1;
            let (f_lo, f_hi) = self.config.mutation;
            let f = if f_hi > f_lo { rng.random_range(f_lo..f_hi) } else { f_lo };

            let trials: Vec<Vec<f64>> = (0..npop)
                .map(|i| {
                    let (r1, r2) = two_others(i, npop, &mut rng);
                    let forced = rng.random_range(0..ndim);
                    (0..ndim)
                        .map(|k| {
                            let keep = k != forced && rng.random::<f64>() >= self.config.recombination;
                            if keep {
                                population[i][k]
                            } else {
                                let v = population[best][k] + f * (population[r1][k] - population[r2][k]);
                                if (0.0..=1.0).contains(&v) { v } else { rng.random::<f64>() }
                            }
                        })
                        .collect()
                })
                .collect();

            let trial_energies = evaluate(&trials)?;
            n_fev += npop;
            for (i, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
                if energy <= energies[i] {
                    population[i] = trial;
                    energies[i] = energy;
                }
            }
            best = best_index(&energies);

            if has_converged(&energies, self.config.atol, self.config.tol) {
                converged = true;
                break;
            }
        }

        let mut result = OptimizationResult {
            parameters: scale(&population[best]),
            fval: energies[best],
            n_iter: generation as u64,
            n_fev,
            converged,
            message: if converged {
                "population energy spread below tolerance".to_string()
            } else {
                "maximum number of generations reached".to_string()
            },
        };
        log::debug!("differential evolution: {result}");

        if self.config.polish && result.fval < PENALTY {
            let polished = NelderMeadOptimizer::new(OptimizerConfig::default()).minimize(
                objective,
                &result.parameters,
                bounds,
            )?;
            result.n_fev += polished.n_fev;
            if polished.fval < result.fval {
                result.parameters = polished.parameters;
                result.fval = polished.fval;
            }
        }
        Ok(result)
    }
}

fn best_index(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(bi, bv), (i, &v)| if v < bv { (i, v) } else { (bi, bv) })
        .0
}

/// Two distinct indices in `0..n`, both different from `i`.
fn two_others(i: usize, n: usize, rng: &mut StdRng) -> (usize, usize) {
    let mut pick = |exclude: &[usize]| loop {
        let j = rng.random_range(0..n);
        if !exclude.contains(&j) {
            return j;
        }
    };
    let r1 = pick(&[i]);
    let r2 = pick(&[i, r1]);
    (r1, r2)
}

/// `n` points in `[0, 1)^ndim`, one per stratum along every axis.
fn latin_hypercube(n: usize, ndim: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut points = vec![vec![0.0; ndim]; n];
    let mut strata: Vec<usize> = (0..n).collect();
    for k in 0..ndim {
        strata.shuffle(rng);
        for (point, &s) in points.iter_mut().zip(&strata) {
            point[k] = (s as f64 + rng.random::<f64>()) / n as f64;
        }
    }
    points
}

/// `std(E) <= atol + tol * |mean(E)|` over non-penalized energies.
fn has_converged(energies: &[f64], atol: f64, tol: f64) -> bool {
    let finite: Vec<f64> = energies.iter().copied().filter(|&e| e < PENALTY).collect();
    if finite.len() < energies.len() || finite.len() < 2 {
        return false;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() <= atol + tol * mean.abs()
}

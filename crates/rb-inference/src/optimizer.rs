//! Local optimization
//!
//! A thin wrapper around argmin's Nelder–Mead with box constraints, used to
//! polish the global optimum found by differential evolution. Likelihood
//! surfaces here are only piecewise smooth (the waveform is cut at ISCO),
//! so the simplex method is preferred over gradient-based solvers.

use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use rb_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cost assigned to rejected or non-finite evaluations.
pub const PENALTY: f64 = 1e300;

/// Configuration for the Nelder–Mead optimizer
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Stop once the standard deviation of the simplex costs falls below this
    pub tol: f64,
    /// Initial simplex size as a fraction of each parameter's range
    pub initial_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 500, tol: 1e-8, initial_step: 0.01 }
    }
}

/// Result of optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective evaluations
    pub n_fev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.converged
        )
    }
}

/// Objective function trait for optimization
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate function at given parameters
    fn eval(&self, params: &[f64]) -> Result<f64>;
}

/// Map rejected (`-inf` log-likelihood, hence `+inf` cost) or NaN values to
/// a large finite cost so simplex and population comparisons stay ordered.
pub(crate) fn finite_cost(value: f64) -> f64 {
    if value.is_finite() { value.min(PENALTY) } else { PENALTY }
}

pub(crate) fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

pub(crate) fn check_bounds(bounds: &[(f64, f64)]) -> Result<()> {
    if bounds.is_empty() {
        return Err(Error::Validation("at least one bounded parameter is required".into()));
    }
    for (i, &(lo, hi)) in bounds.iter().enumerate() {
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(Error::Validation(format!(
                "bounds for parameter {i} must be finite with lower < upper, got ({lo}, {hi})"
            )));
        }
    }
    Ok(())
}

/// Wrapper to make ObjectiveFunction compatible with argmin
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    counts: Arc<AtomicUsize>,
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.objective
            .eval(&clamped)
            .map(finite_cost)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

/// Nelder–Mead simplex optimizer with box constraints (by clamping)
pub struct NelderMeadOptimizer {
    config: OptimizerConfig,
}

impl NelderMeadOptimizer {
    /// Create new optimizer with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize `objective` starting from `init_params` within `bounds`.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }
        check_bounds(bounds)?;
        let start = clamp_params(init_params, bounds);

        // Simplex: the start plus one vertex per axis, stepping inwards at a bound.
        let mut simplex = vec![start.clone()];
        for (i, &(lo, hi)) in bounds.iter().enumerate() {
            let step = self.config.initial_step * (hi - lo);
            let mut vertex = start.clone();
            vertex[i] = if start[i] + step <= hi { start[i] + step } else { start[i] - step };
            simplex.push(vertex);
        }

        let counts = Arc::new(AtomicUsize::new(0));
        let problem = ArgminProblem { objective, bounds, counts: counts.clone() };
        let solver = NelderMead::new(simplex).with_sd_tolerance(self.config.tol).map_err(|e| {
            Error::Validation(format!("Invalid optimizer configuration (tol): {e}"))
        })?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("Optimization failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("No best parameters found".to_string()))?;
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(OptimizationResult {
            parameters: clamp_params(best, bounds),
            fval: state.get_best_cost(),
            n_iter: state.get_iter(),
            n_fev: counts.load(Ordering::Relaxed),
            converged,
            message: termination.to_string(),
        })
    }
}

impl Default for NelderMeadOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

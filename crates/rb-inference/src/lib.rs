//! # rb-inference
//!
//! Inference drivers for RelBin.
//!
//! This crate provides:
//! - Nelder–Mead (argmin) and differential evolution minimizers
//! - the iterative fiducial search for relative-binning likelihoods
//! - a nested sampler returning evidence and weighted posterior samples
//!
//! Samplers only see [`rb_core::LogLikelihood`]; the fiducial search is the
//! one place that needs the concrete relative-binning type, because it moves
//! the fiducial between rounds.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Differential evolution global minimizer.
pub mod differential_evolution;
/// Iterative fiducial search.
pub mod fiducial_search;
/// Nested sampling and parallel multi-run driver.
pub mod nested;
/// Objective trait and Nelder–Mead polishing.
pub mod optimizer;

pub use differential_evolution::{DifferentialEvolution, DifferentialEvolutionConfig};
pub use fiducial_search::{
    FiducialSearchConfig, FiducialSearchResult, SearchStep, StopReason, search_fiducial,
};
pub use nested::{NestedConfig, NestedResult, WeightedSample, run_nested, run_nested_multi};
pub use optimizer::{NelderMeadOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};

//! Probability building blocks for RelBin.
//!
//! This crate hosts the prior side of the inference problem:
//! - one-dimensional priors with log-density, unit-cube rescaling and sampling
//! - prior dictionaries keyed by parameter name
//! - small numeric helpers (log-sum-exp, `ln I0`, quadrature weights)

pub mod math;
pub mod prior;
pub mod prior_dict;

pub use prior::{Boundary, Prior};
pub use prior_dict::PriorDict;

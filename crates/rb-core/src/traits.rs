//! Core traits for RelBin
//!
//! Samplers and optimizers see a likelihood only through [`LogLikelihood`]:
//! a pure function from a parameter map to a scalar. Caches behind the
//! implementation are its own business.

use crate::Result;
use crate::types::Parameters;

/// Scalar log-likelihood over named parameters.
pub trait LogLikelihood: Send + Sync {
    /// Log-likelihood ratio against the noise-only hypothesis.
    fn log_likelihood_ratio(&self, params: &Parameters) -> Result<f64>;

    /// Log-likelihood of the noise-only hypothesis (independent of `params`).
    fn noise_log_likelihood(&self) -> Result<f64>;

    /// Log-likelihood: `log_likelihood_ratio + noise_log_likelihood`.
    fn log_likelihood(&self, params: &Parameters) -> Result<f64> {
        Ok(self.log_likelihood_ratio(params)? + self.noise_log_likelihood()?)
    }
}

impl<T: LogLikelihood + ?Sized> LogLikelihood for &T {
    fn log_likelihood_ratio(&self, params: &Parameters) -> Result<f64> {
        (**self).log_likelihood_ratio(params)
    }

    fn noise_log_likelihood(&self) -> Result<f64> {
        (**self).noise_log_likelihood()
    }

    fn log_likelihood(&self, params: &Parameters) -> Result<f64> {
        (**self).log_likelihood(params)
    }
}

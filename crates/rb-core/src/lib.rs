//! # rb-core
//!
//! Shared foundation for the RelBin workspace: the error type, the likelihood
//! trait consumed by samplers, and small value types passed between crates.
//!
//! Higher-level crates (`rb-gw`, `rb-inference`) depend on the traits defined
//! here, never on each other's concrete likelihood types at the sampler seam.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error type and `Result` alias.
pub mod error;
/// Traits at the likelihood/sampler boundary.
pub mod traits;
/// Parameter maps and inner-product bundles.
pub mod types;

pub use error::{Error, Result};
pub use traits::LogLikelihood;
pub use types::{CalculatedSnrs, Parameters};

/// Complex strain sample type used throughout the workspace.
pub use num_complex::Complex64;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # rb-gw
//!
//! Gravitational-wave transient likelihoods for RelBin.
//!
//! This crate provides:
//! - dense frequency grids and interferometer data (strain, PSD, mask)
//! - detector geometry: antenna patterns and geocentre time delays
//! - a frequency-domain waveform generator that evaluates on an explicit
//!   frequency subset and enforces the output length
//! - the dense-grid likelihood and the relative-binning likelihood
//!
//! ## Relative binning
//!
//! The waveform is evaluated only at sparse bin edges; per-bin summary data
//! computed once against a fiducial waveform turn each evaluation into an
//! O(bins) sum. See [`relative_binning::RelativeBinningLikelihood`].

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Bin-edge selection.
pub mod binning;
/// Physical constants.
pub mod constants;
/// Serialized detector data and simulation.
pub mod data;
/// Detector geometry and interferometer data.
pub mod detector;
/// Fiducial snapshot: cached edge waveforms and summary data.
pub mod fiducial;
/// Dense frequency grid with validity mask.
pub mod grid;
/// Phase / distance marginalization.
pub mod marginalization;
/// Noise power spectral densities.
pub mod psd;
/// Relative-binning likelihood.
pub mod relative_binning;
/// Analytic frequency-domain source models.
pub mod source;
/// Per-bin summary data.
pub mod summary;
/// Dense-grid likelihood.
pub mod transient;
/// Waveform generator and polarizations.
pub mod waveform;

pub use binning::{BinEdges, BinningConfig};
pub use data::DetectorDataSet;
pub use detector::{DetectorGeometry, Interferometer};
pub use fiducial::FiducialSnapshot;
pub use grid::FrequencyGrid;
pub use marginalization::{Marginalization, MarginalizationKind};
pub use psd::PowerSpectralDensity;
pub use relative_binning::{DegenerateRatioPolicy, RelativeBinningLikelihood};
pub use source::InspiralTaylorF2;
pub use summary::SummaryData;
pub use transient::GravitationalWaveTransient;
pub use waveform::{FrequencyDomainSource, Polarizations, WaveformGenerator};

//! Fiducial snapshot: everything relative binning caches about the reference
//! waveform, built in one piece and never mutated afterwards.

use crate::binning::BinEdges;
use crate::detector::Interferometer;
use crate::summary::SummaryData;
use crate::waveform::{Polarizations, WaveformGenerator};
use rb_core::{Complex64, Parameters, Result};

/// Relative threshold below which an edge response counts as zero.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Cached fiducial quantities for one detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorFiducial {
    /// Detector name.
    pub name: String,
    /// Fiducial detector response at the bin edges.
    pub edge_response: Vec<Complex64>,
    /// Per-bin summary data against this detector's strain.
    pub summary: SummaryData,
}

/// Immutable, versioned fiducial cache.
#[derive(Debug, Clone)]
pub struct FiducialSnapshot {
    version: u64,
    parameters: Parameters,
    edge_polarizations: Polarizations,
    detectors: Vec<DetectorFiducial>,
    degeneracy_threshold: f64,
}

impl FiducialSnapshot {
    /// Evaluate the fiducial waveform on the dense grid once and derive the
    /// edge responses and summary data of every detector.
    pub fn build(
        version: u64,
        parameters: &Parameters,
        generator: &WaveformGenerator,
        interferometers: &[Interferometer],
        edges: &BinEdges,
    ) -> Result<Self> {
        let dense = generator.frequency_domain_strain(parameters)?;
        let edge_polarizations = dense.gather(edges.indices());

        let mut detectors = Vec::with_capacity(interferometers.len());
        for ifo in interferometers {
            let response = ifo.grid_response(&dense, parameters)?;
            let summary = SummaryData::compute(ifo, &response, edges)?;
            let edge_response = edges.indices().iter().map(|&i| response[i]).collect();
            detectors.push(DetectorFiducial { name: ifo.name().to_string(), edge_response, summary });
        }

        let peak = detectors
            .iter()
            .flat_map(|d| d.edge_response.iter())
            .map(|h| h.norm())
            .fold(0.0, f64::max);

        log::debug!("fiducial snapshot v{version}: peak edge response {peak:.3e}");
        Ok(Self {
            version,
            parameters: parameters.clone(),
            edge_polarizations,
            detectors,
            degeneracy_threshold: DEGENERACY_TOLERANCE * peak,
        })
    }

    /// Monotonic version; bumped on every rebuild.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Reference parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Fiducial polarizations at the bin edges.
    pub fn edge_polarizations(&self) -> &Polarizations {
        &self.edge_polarizations
    }

    /// Per-detector caches, in interferometer order.
    pub fn detectors(&self) -> &[DetectorFiducial] {
        &self.detectors
    }

    /// Absolute magnitude at or below which an edge response is treated as zero.
    pub fn degeneracy_threshold(&self) -> f64 {
        self.degeneracy_threshold
    }

    /// Number of fiducial edges with a degenerate response, summed over detectors.
    pub fn degenerate_edge_count(&self) -> usize {
        self.detectors
            .iter()
            .flat_map(|d| d.edge_response.iter())
            .filter(|h| h.norm() <= self.degeneracy_threshold)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::BinningConfig;
    use crate::data::simulate_interferometer;
    use crate::grid::FrequencyGrid;
    use crate::psd::PowerSpectralDensity;
    use crate::source::InspiralTaylorF2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn params(chirp_mass: f64) -> Parameters {
        [
            ("chirp_mass", chirp_mass),
            ("mass_ratio", 0.8),
            ("luminosity_distance", 150.0),
            ("theta_jn", 1.0),
            ("phase", 0.2),
            ("ra", 1.0),
            ("dec", 0.3),
            ("psi", 0.1),
            ("geocent_time", 1000.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn setup() -> (WaveformGenerator, Vec<Interferometer>, BinEdges) {
        let grid = FrequencyGrid::new(1024.0, 4.0, 20.0, 400.0).unwrap();
        let generator = WaveformGenerator::new(grid.clone(), Arc::new(InspiralTaylorF2));
        let mut rng = StdRng::seed_from_u64(1);
        let ifo = simulate_interferometer("H1", &grid, 998.0, &PowerSpectralDensity::AligoFit, Some(&mut rng))
            .unwrap();
        let edges = BinEdges::from_grid(&grid, &BinningConfig::default()).unwrap();
        (generator, vec![ifo], edges)
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let (generator, ifos, edges) = setup();
        let a = FiducialSnapshot::build(1, &params(1.3), &generator, &ifos, &edges).unwrap();
        let b = FiducialSnapshot::build(2, &params(1.3), &generator, &ifos, &edges).unwrap();
        assert_eq!(a.detectors(), b.detectors());
        assert_eq!(a.edge_polarizations(), b.edge_polarizations());
        assert_eq!(a.degeneracy_threshold(), b.degeneracy_threshold());
        assert_eq!((a.version(), b.version()), (1, 2));
    }

    #[test]
    fn test_shapes_follow_edges() {
        let (generator, ifos, edges) = setup();
        let snap = FiducialSnapshot::build(1, &params(1.3), &generator, &ifos, &edges).unwrap();
        assert_eq!(snap.edge_polarizations().len(), edges.len());
        let det = &snap.detectors()[0];
        assert_eq!(det.name, "H1");
        assert_eq!(det.edge_response.len(), edges.len());
        assert_eq!(det.summary.n_bins(), edges.n_bins());
        assert_eq!(snap.degenerate_edge_count(), 0);
    }

    #[test]
    fn test_cutoff_inside_band_gives_degenerate_edges() {
        // Heavy enough that the inspiral ends below 400 Hz.
        let (generator, ifos, edges) = setup();
        let snap = FiducialSnapshot::build(1, &params(6.0), &generator, &ifos, &edges).unwrap();
        assert!(snap.degenerate_edge_count() > 0);
        assert!(snap.degeneracy_threshold() > 0.0);
    }
}

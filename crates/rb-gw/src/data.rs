//! Serialized detector data and simulated noise.
//!
//! On disk a data set is one JSON document:
//!
//! ```json
//! {"interferometers": [{"name": "H1", "start_time": 1187008880.0, "duration": 8.0,
//!   "sampling_frequency": 2048.0, "minimum_frequency": 20.0, "maximum_frequency": 800.0,
//!   "strain": [[0.0, 0.0], ...], "psd": [1e-46, ...]}]}
//! ```
//!
//! Strain values are `[re, im]` pairs. A `geometry` object may be given for a
//! detector that is not one of `H1`, `L1`, `V1`.

use crate::detector::{DetectorGeometry, Interferometer};
use crate::grid::FrequencyGrid;
use crate::psd::PowerSpectralDensity;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rb_core::{Complex64, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// One detector's data as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterferometerData {
    /// Detector name.
    pub name: String,
    /// Explicit geometry; looked up by name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<DetectorGeometry>,
    /// GPS start time.
    pub start_time: f64,
    /// Segment duration, s.
    pub duration: f64,
    /// Sampling frequency, Hz.
    pub sampling_frequency: f64,
    /// Lower edge of the analysis band, Hz.
    pub minimum_frequency: f64,
    /// Upper edge of the analysis band, Hz.
    pub maximum_frequency: f64,
    /// Frequency-domain strain as `[re, im]` pairs.
    pub strain: Vec<[f64; 2]>,
    /// One-sided PSD.
    pub psd: Vec<f64>,
}

impl InterferometerData {
    /// Rebuild the grid and validate the arrays against it.
    pub fn to_interferometer(&self) -> Result<Interferometer> {
        let geometry = match self.geometry {
            Some(g) => g,
            None => DetectorGeometry::known(&self.name).ok_or_else(|| {
                Error::Configuration(format!(
                    "unknown detector '{}' and no geometry given",
                    self.name
                ))
            })?,
        };
        let grid = FrequencyGrid::new(
            self.sampling_frequency,
            self.duration,
            self.minimum_frequency,
            self.maximum_frequency,
        )?;
        let strain = self.strain.iter().map(|&[re, im]| Complex64::new(re, im)).collect();
        Interferometer::new(
            self.name.clone(),
            geometry,
            grid,
            self.start_time,
            strain,
            self.psd.clone(),
        )
    }

    /// Serializable form of `ifo`.
    pub fn from_interferometer(ifo: &Interferometer) -> Self {
        let geometry = match DetectorGeometry::known(ifo.name()) {
            Some(known) if known == *ifo.geometry() => None,
            _ => Some(*ifo.geometry()),
        };
        let grid = ifo.grid();
        Self {
            name: ifo.name().to_string(),
            geometry,
            start_time: ifo.start_time(),
            duration: grid.duration(),
            sampling_frequency: grid.sampling_frequency(),
            minimum_frequency: grid.minimum_frequency(),
            maximum_frequency: grid.maximum_frequency(),
            strain: ifo.strain().iter().map(|c| [c.re, c.im]).collect(),
            psd: ifo.psd().to_vec(),
        }
    }
}

/// A set of detectors observed over the same segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorDataSet {
    /// Per-detector data.
    pub interferometers: Vec<InterferometerData>,
}

impl DetectorDataSet {
    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write as JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Validated interferometers.
    pub fn to_interferometers(&self) -> Result<Vec<Interferometer>> {
        if self.interferometers.is_empty() {
            return Err(Error::Configuration("data set contains no interferometers".into()));
        }
        self.interferometers.iter().map(InterferometerData::to_interferometer).collect()
    }

    /// Serializable form of `interferometers`.
    pub fn from_interferometers(interferometers: &[Interferometer]) -> Self {
        Self {
            interferometers: interferometers.iter().map(InterferometerData::from_interferometer).collect(),
        }
    }
}

/// Interferometer with a model PSD and either zero strain or Gaussian noise
/// drawn from `rng`.
///
/// Real and imaginary parts are independent `N(0, sqrt(S T) / 2)`, so that
/// `<n, n>` has expectation two per band point.
pub fn simulate_interferometer<R: Rng + ?Sized>(
    name: &str,
    grid: &FrequencyGrid,
    start_time: f64,
    psd_model: &PowerSpectralDensity,
    rng: Option<&mut R>,
) -> Result<Interferometer> {
    let geometry = DetectorGeometry::known(name)
        .ok_or_else(|| Error::Configuration(format!("unknown detector '{name}'")))?;
    let psd = psd_model.array(grid)?;
    let strain = match rng {
        None => vec![Complex64::new(0.0, 0.0); grid.len()],
        Some(rng) => {
            let duration = grid.duration();
            let mut strain = Vec::with_capacity(grid.len());
            for &s in &psd {
                let sigma = 0.5 * (s * duration).sqrt();
                let normal = Normal::new(0.0, sigma)
                    .map_err(|e| Error::Computation(format!("noise distribution: {e}")))?;
                strain.push(Complex64::new(normal.sample(rng), normal.sample(rng)));
            }
            strain
        }
    };
    Interferometer::new(name, geometry, grid.clone(), start_time, strain, psd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn grid() -> FrequencyGrid {
        FrequencyGrid::new(256.0, 4.0, 20.0, 100.0).unwrap()
    }

    #[test]
    fn test_json_roundtrip_preserves_interferometer() {
        let mut rng = StdRng::seed_from_u64(7);
        let ifo = simulate_interferometer("L1", &grid(), 1e9, &PowerSpectralDensity::AligoFit, Some(&mut rng))
            .unwrap();
        let set = DetectorDataSet::from_interferometers(std::slice::from_ref(&ifo));
        assert!(set.interferometers[0].geometry.is_none());
        let json = serde_json::to_string(&set).unwrap();
        let back = DetectorDataSet::from_json_str(&json).unwrap().to_interferometers().unwrap();
        assert_eq!(back[0].strain(), ifo.strain());
        assert_eq!(back[0].psd(), ifo.psd());
        assert_eq!(back[0].grid(), ifo.grid());
    }

    #[test]
    fn test_wrong_strain_length_is_shape_error() {
        let ifo = simulate_interferometer::<StdRng>("H1", &grid(), 0.0, &PowerSpectralDensity::AligoFit, None)
            .unwrap();
        let mut data = InterferometerData::from_interferometer(&ifo);
        data.strain.pop();
        let err = data.to_interferometer().unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }), "{err}");
    }

    #[test]
    fn test_unknown_detector_needs_geometry() {
        let ifo = simulate_interferometer::<StdRng>("V1", &grid(), 0.0, &PowerSpectralDensity::AligoFit, None)
            .unwrap();
        let mut data = InterferometerData::from_interferometer(&ifo);
        data.name = "X1".into();
        assert!(matches!(data.to_interferometer(), Err(Error::Configuration(_))));
        data.geometry = Some(DetectorGeometry::virgo());
        assert!(data.to_interferometer().is_ok());
    }

    #[test]
    fn test_noise_power_matches_expectation() {
        let mut rng = StdRng::seed_from_u64(11);
        let ifo = simulate_interferometer("H1", &grid(), 0.0, &PowerSpectralDensity::AligoFit, Some(&mut rng))
            .unwrap();
        let n = ifo.grid().n_valid() as f64;
        // -<n,n>/2 has mean -n and standard deviation sqrt(n).
        let nll = ifo.noise_log_likelihood();
        assert!((nll + n).abs() < 5.0 * n.sqrt(), "noise log-likelihood {nll} for {n} points");
    }

    #[test]
    fn test_write_to_then_read_back() {
        let ifo = simulate_interferometer::<StdRng>("H1", &grid(), 0.0, &PowerSpectralDensity::AligoFit, None)
            .unwrap();
        let set = DetectorDataSet::from_interferometers(std::slice::from_ref(&ifo));
        let path = std::env::temp_dir().join(format!("rb_gw_data_{}.json", std::process::id()));
        set.write_to(&path).unwrap();
        let back = DetectorDataSet::from_path(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back.interferometers.len(), 1);
        let read = back.to_interferometers().unwrap();
        assert_eq!(read[0].grid(), ifo.grid());
        assert_eq!(read[0].strain().len(), ifo.strain().len());
    }

    #[test]
    fn test_empty_data_set() {
        assert!(DetectorDataSet::default().to_interferometers().is_err());
    }
}

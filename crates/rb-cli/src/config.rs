//! Run configuration shared by every `relbin` subcommand.

use anyhow::{Context, Result};
use rb_core::Parameters;
use rb_gw::{
    BinningConfig, DegenerateRatioPolicy, DetectorGeometry, FrequencyGrid, MarginalizationKind,
    PowerSpectralDensity,
};
use rb_inference::{FiducialSearchConfig, NestedConfig};
use rb_prob::{Prior, PriorDict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Sampling of the analysis segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Sampling frequency, Hz.
    pub sampling_frequency: f64,
    /// Segment duration, s.
    pub duration: f64,
    /// Lower edge of the analysis band, Hz.
    pub minimum_frequency: f64,
    /// Upper edge of the analysis band, Hz.
    pub maximum_frequency: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sampling_frequency: 2048.0,
            duration: 8.0,
            minimum_frequency: 20.0,
            maximum_frequency: 800.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub grid: GridConfig,
    /// Detector names (`H1`, `L1`, `V1`).
    pub detectors: Vec<String>,
    pub psd: PowerSpectralDensity,
    /// Gaussian noise seed; zero noise when absent.
    pub noise_seed: Option<u64>,
    /// Seconds of data after the injected coalescence.
    pub post_trigger_duration: f64,
    /// Injected signal; also the starting fiducial unless `fiducial` is set.
    pub injection: Parameters,
    pub fiducial: Option<Parameters>,
    pub binning: BinningConfig,
    /// Keys searched by `relbin fiducial` and their ranges.
    pub search_bounds: BTreeMap<String, (f64, f64)>,
    pub fiducial_search: FiducialSearchConfig,
    pub marginalization: MarginalizationKind,
    pub degenerate_ratio_policy: DegenerateRatioPolicy,
    /// Sampling priors; binary-neutron-star defaults when absent.
    pub priors: Option<PriorDict>,
    pub sampler: NestedConfig,
    /// Independent sampler runs (seeds `sampler.seed + i`).
    pub n_runs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        let injection: Parameters = [
            ("chirp_mass", 1.2),
            ("mass_ratio", 0.9),
            ("luminosity_distance", 100.0),
            ("theta_jn", 0.4),
            ("phase", 1.3),
            ("ra", 3.44),
            ("dec", -0.41),
            ("psi", 0.7),
            ("geocent_time", 1_187_008_882.4),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let search_bounds = [
            ("chirp_mass", (1.1995, 1.2005)),
            ("geocent_time", (1_187_008_882.39, 1_187_008_882.41)),
        ]
        .into_iter()
        .map(|(k, b)| (k.to_string(), b))
        .collect();
        Self {
            grid: GridConfig::default(),
            detectors: vec!["H1".into(), "L1".into()],
            psd: PowerSpectralDensity::default(),
            noise_seed: None,
            post_trigger_duration: 2.0,
            injection,
            fiducial: None,
            binning: BinningConfig::default(),
            search_bounds,
            fiducial_search: FiducialSearchConfig::default(),
            marginalization: MarginalizationKind::default(),
            degenerate_ratio_policy: DegenerateRatioPolicy::default(),
            priors: None,
            sampler: NestedConfig::default(),
            n_runs: 1,
        }
    }
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading run config {}", path.display()))?;
    let cfg: RunConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing run config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

impl RunConfig {
    pub fn frequency_grid(&self) -> Result<FrequencyGrid> {
        let g = &self.grid;
        Ok(FrequencyGrid::new(
            g.sampling_frequency,
            g.duration,
            g.minimum_frequency,
            g.maximum_frequency,
        )?)
    }

    pub fn trigger_time(&self) -> Result<f64> {
        Ok(rb_core::types::require(&self.injection, "geocent_time")?)
    }

    /// GPS start of the segment, placing the trigger `post_trigger_duration`
    /// before its end.
    pub fn start_time(&self) -> Result<f64> {
        Ok(self.trigger_time()? + self.post_trigger_duration - self.grid.duration)
    }

    pub fn fiducial_parameters(&self) -> &Parameters {
        self.fiducial.as_ref().unwrap_or(&self.injection)
    }

    /// Sampling priors, with a ±0.1 s coalescence-time window added to the
    /// defaults.
    pub fn prior_dict(&self) -> Result<PriorDict> {
        if let Some(priors) = &self.priors {
            return Ok(priors.clone());
        }
        let t0 = self.trigger_time()?;
        let mut priors = PriorDict::binary_neutron_star();
        priors.insert("geocent_time", Prior::uniform(t0 - 0.1, t0 + 0.1));
        Ok(priors)
    }

    /// Fail fast on anything that would only surface halfway through a run.
    pub fn validate(&self) -> Result<()> {
        self.frequency_grid().context("invalid grid")?;
        if self.detectors.is_empty() {
            anyhow::bail!("at least one detector is required");
        }
        for name in &self.detectors {
            if DetectorGeometry::known(name).is_none() {
                anyhow::bail!("unknown detector '{name}' (expected H1, L1 or V1)");
            }
        }
        if let PowerSpectralDensity::Flat { value } = self.psd {
            if !(value.is_finite() && value > 0.0) {
                anyhow::bail!("flat PSD value must be > 0, got {value}");
            }
        }
        if !(0.0..self.grid.duration).contains(&self.post_trigger_duration) {
            anyhow::bail!(
                "post_trigger_duration must lie in [0, {}), got {}",
                self.grid.duration,
                self.post_trigger_duration
            );
        }
        self.trigger_time().context("injection")?;
        self.binning.validate().context("invalid binning")?;
        self.fiducial_search.differential_evolution.validate().context("invalid fiducial search")?;
        for key in self.search_bounds.keys() {
            if !self.fiducial_parameters().contains_key(key) {
                anyhow::bail!("search bound '{key}' is not a fiducial parameter");
            }
        }
        self.sampler.validate().context("invalid sampler settings")?;
        self.prior_dict()?.validate().context("invalid priors")?;
        if self.n_runs == 0 {
            anyhow::bail!("n_runs must be > 0");
        }
        Ok(())
    }
}

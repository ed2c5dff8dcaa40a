//! Named collections of priors.

use crate::prior::{Boundary, Prior};
use rb_core::{Error, Parameters, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::path::Path;

/// Parameter name → prior.
///
/// Keys with a [`Prior::DeltaFunction`] are fixed; all other keys are
/// searched. Searched keys are ordered by name, which defines the layout of
/// the unit-cube vectors used by samplers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorDict {
    priors: BTreeMap<String, Prior>,
}

/// Groups of alternative parameterizations; at most `limit` keys of a group
/// can be sampled together without over-constraining the model.
const REDUNDANCY_GROUPS: &[(&[&str], usize)] = &[
    (&["mass_1", "mass_2", "chirp_mass", "total_mass", "mass_ratio", "symmetric_mass_ratio"], 2),
    (&["theta_jn", "cos_theta_jn"], 1),
    (&["luminosity_distance", "comoving_distance", "redshift"], 1),
];

impl PriorDict {
    /// Empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default priors for a binary-neutron-star search.
    ///
    /// Coalescence time is left out; it depends on the event and must be added
    /// by the caller (typically `Uniform(t0 - 0.1, t0 + 0.1)`).
    pub fn binary_neutron_star() -> Self {
        let mut d = Self::new();
        d.insert("chirp_mass", Prior::uniform(0.87, 1.74));
        d.insert("mass_ratio", Prior::uniform(0.125, 1.0));
        d.insert(
            "luminosity_distance",
            Prior::PowerLaw { alpha: 2.0, minimum: 10.0, maximum: 500.0, boundary: None },
        );
        d.insert("dec", Prior::Cosine { minimum: -PI / 2.0, maximum: PI / 2.0, boundary: None });
        d.insert("ra", Prior::periodic(0.0, 2.0 * PI));
        d.insert("theta_jn", Prior::Sine { minimum: 0.0, maximum: PI, boundary: None });
        d.insert("psi", Prior::periodic(0.0, PI));
        d.insert("phase", Prior::periodic(0.0, 2.0 * PI));
        d
    }

    /// Parse from a JSON object of tagged priors.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dict: PriorDict = serde_json::from_str(json)?;
        dict.validate()?;
        Ok(dict)
    }

    /// Read and parse a JSON prior file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Insert or replace a prior; warns when the key duplicates information
    /// already carried by other keys.
    pub fn insert(&mut self, key: impl Into<String>, prior: Prior) {
        let key = key.into();
        if self.is_redundant(&key) {
            log::warn!("prior '{key}' is redundant with existing keys; this may over-constrain the model");
        }
        self.priors.insert(key, prior);
    }

    /// Prior for `key`.
    pub fn get(&self, key: &str) -> Option<&Prior> {
        self.priors.get(key)
    }

    /// Number of priors (fixed and searched).
    pub fn len(&self) -> usize {
        self.priors.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }

    /// Validate every prior.
    pub fn validate(&self) -> Result<()> {
        for (key, prior) in &self.priors {
            prior
                .validate()
                .map_err(|e| Error::Validation(format!("prior '{key}': {e}")))?;
        }
        Ok(())
    }

    /// Whether adding `key` would over-determine a group of equivalent
    /// parameterizations (e.g. a third mass parameter).
    pub fn is_redundant(&self, key: &str) -> bool {
        let present: BTreeSet<&str> = self.priors.keys().map(String::as_str).collect();
        REDUNDANCY_GROUPS.iter().any(|(group, limit)| {
            group.contains(&key)
                && !present.contains(key)
                && group.iter().filter(|k| present.contains(*k)).count() >= *limit
        })
    }

    /// Names of searched (non-fixed) parameters, sorted.
    pub fn search_keys(&self) -> Vec<String> {
        self.priors.iter().filter(|(_, p)| !p.is_fixed()).map(|(k, _)| k.clone()).collect()
    }

    /// Number of searched parameters.
    pub fn ndim(&self) -> usize {
        self.priors.values().filter(|p| !p.is_fixed()).count()
    }

    /// Values of fixed parameters.
    pub fn fixed_parameters(&self) -> Parameters {
        self.priors
            .iter()
            .filter_map(|(k, p)| match *p {
                Prior::DeltaFunction { peak } => Some((k.clone(), peak)),
                _ => None,
            })
            .collect()
    }

    /// Boundary behaviour for each searched key, in `search_keys` order.
    pub fn boundaries(&self) -> Vec<Option<Boundary>> {
        self.priors.values().filter(|p| !p.is_fixed()).map(Prior::boundary).collect()
    }

    /// Bounds for each searched key, in `search_keys` order.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.priors.values().filter(|p| !p.is_fixed()).map(Prior::bounds).collect()
    }

    /// Map a unit-cube point to a full parameter map (fixed values included).
    pub fn rescale(&self, unit: &[f64]) -> Result<Parameters> {
        let ndim = self.ndim();
        rb_core::error::ensure_len("prior rescale", ndim, unit.len())?;
        let mut params = self.fixed_parameters();
        let searched = self.priors.iter().filter(|(_, p)| !p.is_fixed());
        for ((key, prior), &u) in searched.zip(unit.iter()) {
            params.insert(key.clone(), prior.rescale(u)?);
        }
        Ok(params)
    }

    /// Joint log-density of the searched keys present in `params`.
    ///
    /// A missing searched key is a validation error.
    pub fn ln_prob(&self, params: &Parameters) -> Result<f64> {
        let mut lp = 0.0;
        for (key, prior) in self.priors.iter().filter(|(_, p)| !p.is_fixed()) {
            let x = rb_core::types::require(params, key)?;
            lp += prior.ln_prob(x);
        }
        Ok(lp)
    }

    /// Draw a full parameter map.
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Result<Parameters> {
        let unit: Vec<f64> = (0..self.ndim()).map(|_| rng.random::<f64>()).collect();
        self.rescale(&unit)
    }

    /// Flatten the searched keys of `params` in `search_keys` order.
    pub fn to_vector(&self, params: &Parameters) -> Result<Vec<f64>> {
        self.search_keys().iter().map(|k| rb_core::types::require(params, k)).collect()
    }

    /// Inverse of [`PriorDict::to_vector`]; fixed values are merged in.
    pub fn from_vector(&self, values: &[f64]) -> Result<Parameters> {
        let keys = self.search_keys();
        rb_core::error::ensure_len("parameter vector", keys.len(), values.len())?;
        let mut params = self.fixed_parameters();
        params.extend(keys.into_iter().zip(values.iter().copied()));
        Ok(params)
    }

    /// Iterate over `(name, prior)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Prior)> {
        self.priors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn test_bns_defaults_are_valid() {
        let d = PriorDict::binary_neutron_star();
        d.validate().unwrap();
        assert_eq!(d.ndim(), 8);
        assert!(d.fixed_parameters().is_empty());
    }

    #[test]
    fn test_search_keys_skip_fixed() {
        let mut d = PriorDict::new();
        d.insert("b", Prior::uniform(0.0, 1.0));
        d.insert("a", Prior::DeltaFunction { peak: 3.0 });
        d.insert("c", Prior::uniform(-1.0, 1.0));
        assert_eq!(d.search_keys(), vec!["b".to_string(), "c".to_string()]);

        let params = d.rescale(&[0.5, 0.25]).unwrap();
        assert_relative_eq!(params["a"], 3.0);
        assert_relative_eq!(params["b"], 0.5);
        assert_relative_eq!(params["c"], -0.5);

        assert_eq!(d.to_vector(&params).unwrap(), vec![0.5, -0.5]);
        assert_eq!(d.from_vector(&[0.5, -0.5]).unwrap(), params);
    }

    #[test]
    fn test_rescale_length_mismatch() {
        let d = PriorDict::binary_neutron_star();
        let err = d.rescale(&[0.5; 3]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 8, actual: 3, .. }));
    }

    #[test]
    fn test_ln_prob_sums_independent_priors() {
        let mut d = PriorDict::new();
        d.insert("x", Prior::uniform(0.0, 2.0));
        d.insert("y", Prior::uniform(0.0, 4.0));
        let mut p = Parameters::new();
        p.insert("x".into(), 1.0);
        p.insert("y".into(), 1.0);
        assert_relative_eq!(d.ln_prob(&p).unwrap(), -(8.0_f64).ln(), epsilon = 1e-12);
        p.remove("y");
        assert!(d.ln_prob(&p).is_err());
    }

    #[test]
    fn test_redundancy_detection() {
        let mut d = PriorDict::new();
        d.insert("chirp_mass", Prior::uniform(1.0, 2.0));
        assert!(!d.is_redundant("mass_ratio"));
        d.insert("mass_ratio", Prior::uniform(0.2, 1.0));
        assert!(d.is_redundant("mass_1"));
        d.insert("luminosity_distance", Prior::uniform(10.0, 100.0));
        assert!(d.is_redundant("redshift"));
        assert!(!d.is_redundant("ra"));
    }

    #[test]
    fn test_samples_within_bounds() {
        let d = PriorDict::binary_neutron_star();
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let p = d.sample(&mut rng).unwrap();
            assert!(d.ln_prob(&p).unwrap().is_finite());
        }
    }

    #[test]
    fn test_from_json_validates() {
        let ok = r#"{"chirp_mass":{"type":"Uniform","minimum":1.1,"maximum":1.3},
                     "geocent_time":{"type":"DeltaFunction","peak":0.0}}"#;
        let d = PriorDict::from_json_str(ok).unwrap();
        assert_eq!(d.search_keys(), vec!["chirp_mass".to_string()]);

        let bad = r#"{"chirp_mass":{"type":"Uniform","minimum":1.3,"maximum":1.1}}"#;
        let err = PriorDict::from_json_str(bad).unwrap_err();
        assert!(err.to_string().contains("chirp_mass"));
    }
}

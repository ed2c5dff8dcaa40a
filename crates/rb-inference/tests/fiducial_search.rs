use rand::rngs::StdRng;
use rb_core::{Error, LogLikelihood, Parameters};
use rb_gw::data::simulate_interferometer;
use rb_gw::{
    BinningConfig, FrequencyGrid, GravitationalWaveTransient, InspiralTaylorF2,
    PowerSpectralDensity, RelativeBinningLikelihood, WaveformGenerator,
};
use rb_inference::{
    DifferentialEvolutionConfig, FiducialSearchConfig, StopReason, search_fiducial,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const GPS: f64 = 1_187_008_882.4;

fn grid() -> FrequencyGrid {
    FrequencyGrid::new(2048.0, 8.0, 20.0, 800.0).unwrap()
}

fn injection() -> Parameters {
    [
        ("chirp_mass", 1.2),
        ("mass_ratio", 0.9),
        ("luminosity_distance", 100.0),
        ("theta_jn", 0.4),
        ("phase", 1.3),
        ("ra", 3.44),
        ("dec", -0.41),
        ("psi", 0.7),
        ("geocent_time", GPS),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Noise-free H1/L1 data containing the injection.
fn likelihood(fiducial: &Parameters) -> RelativeBinningLikelihood {
    let generator = WaveformGenerator::new(grid(), Arc::new(InspiralTaylorF2));
    let ifos = ["H1", "L1"]
        .iter()
        .map(|name| {
            let mut ifo = simulate_interferometer::<StdRng>(
                name,
                &grid(),
                GPS - 6.0,
                &PowerSpectralDensity::AligoFit,
                None,
            )
            .unwrap();
            ifo.inject_signal(&generator, &injection()).unwrap();
            ifo
        })
        .collect();
    let transient = GravitationalWaveTransient::new(ifos, generator).unwrap();
    RelativeBinningLikelihood::new(transient, &BinningConfig::default(), fiducial).unwrap()
}

fn search_config() -> FiducialSearchConfig {
    FiducialSearchConfig {
        differential_evolution: DifferentialEvolutionConfig {
            popsize: 20,
            max_generations: 200,
            tol: 0.0,
            atol: 1e-3,
            seed: 5,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn search_moves_fiducial_to_the_peak() {
    let mut start = injection();
    start.insert("chirp_mass".into(), 1.2 + 6e-5);
    let like = likelihood(&start);
    let bounds: BTreeMap<String, (f64, f64)> =
        [("chirp_mass".to_string(), (1.2 - 1e-4, 1.2 + 1e-4))].into_iter().collect();

    let peak = like.log_likelihood_ratio_full(&injection()).unwrap();
    let at_start = like.log_likelihood_ratio_full(&start).unwrap();
    assert!(peak > at_start + 1.0, "start should be visibly off-peak: {at_start} vs {peak}");

    let result = search_fiducial(&like, &start, &bounds, &search_config()).unwrap();

    assert_eq!(result.stop_reason, StopReason::ThresholdReached);
    assert!(result.history.len() >= 2);
    assert!(result.full_log_likelihood_ratio > peak - 0.5, "{} vs {peak}", result.full_log_likelihood_ratio);
    // The approximation is exact at its own fiducial.
    let rel = (result.log_likelihood_ratio - result.full_log_likelihood_ratio).abs()
        / result.full_log_likelihood_ratio.abs();
    assert!(rel < 1e-9, "approx {} vs full {}", result.log_likelihood_ratio, result.full_log_likelihood_ratio);

    assert_eq!(like.fiducial().parameters(), &result.parameters);
    assert_eq!(like.fiducial().version(), result.fiducial_version);
    // Unsearched keys keep their initial values.
    assert_eq!(result.parameters["psi"], 0.7);
}

#[test]
fn single_round_reports_max_iterations() {
    let like = likelihood(&injection());
    let bounds: BTreeMap<String, (f64, f64)> =
        [("psi".to_string(), (0.5, 0.9))].into_iter().collect();
    let config = FiducialSearchConfig { max_iterations: 1, ..search_config() };
    let result = search_fiducial(&like, &injection(), &bounds, &config).unwrap();
    assert_eq!(result.stop_reason, StopReason::MaxIterationsReached);
    assert_eq!(result.history.len(), 1);
}

#[test]
fn invalid_search_is_rejected() {
    let like = likelihood(&injection());
    let unknown: BTreeMap<String, (f64, f64)> =
        [("spin".to_string(), (0.0, 1.0))].into_iter().collect();
    let err = search_fiducial(&like, &injection(), &unknown, &search_config()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err}");

    let bounds: BTreeMap<String, (f64, f64)> =
        [("psi".to_string(), (0.5, 0.9))].into_iter().collect();
    let zero = FiducialSearchConfig { max_iterations: 0, ..search_config() };
    assert!(search_fiducial(&like, &injection(), &bounds, &zero).is_err());
    let empty = BTreeMap::new();
    assert!(search_fiducial(&like, &injection(), &empty, &search_config()).is_err());
}

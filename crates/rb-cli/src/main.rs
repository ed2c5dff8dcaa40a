//! RelBin CLI

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{RunConfig, read_run_config};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rb_core::Parameters;
use rb_gw::data::simulate_interferometer;
use rb_gw::{
    BinEdges, DetectorDataSet, GravitationalWaveTransient, InspiralTaylorF2, Marginalization,
    MarginalizationKind, RelativeBinningLikelihood, WaveformGenerator,
};
use rb_inference::{FiducialSearchResult, run_nested, run_nested_multi, search_fiducial};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "relbin")]
#[command(about = "RelBin - relative-binning likelihoods for compact binary signals")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Threads (0 = auto).
    #[arg(long, global = true, default_value = "0")]
    threads: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate detector data containing the configured injection
    Simulate {
        /// Run configuration (JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the detector data (JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Place relative-binning bin edges on the configured grid
    Bins {
        /// Run configuration (JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Move the fiducial waveform towards the maximum likelihood
    Fiducial {
        /// Run configuration (JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Detector data written by `relbin simulate`
        #[arg(short, long)]
        data: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Nested sampling with the relative-binning likelihood
    Sample {
        /// Run configuration (JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Detector data written by `relbin simulate`
        #[arg(short, long)]
        data: PathBuf,

        /// Fiducial written by `relbin fiducial`; overrides the configured one.
        #[arg(long)]
        fiducial: Option<PathBuf>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(cli.threads).build_global();
    }

    match cli.command {
        Commands::Simulate { config, output } => cmd_simulate(config.as_deref(), output.as_deref()),
        Commands::Bins { config, output } => cmd_bins(config.as_deref(), output.as_deref()),
        Commands::Fiducial { config, data, output } => {
            cmd_fiducial(config.as_deref(), &data, output.as_deref())
        }
        Commands::Sample { config, data, fiducial, output } => {
            cmd_sample(config.as_deref(), &data, fiducial.as_deref(), output.as_deref())
        }
        Commands::Version => {
            println!("relbin {}", rb_core::VERSION);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading run config");
            read_run_config(path)
        }
        None => {
            let cfg = RunConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

fn waveform_generator(cfg: &RunConfig) -> Result<WaveformGenerator> {
    Ok(WaveformGenerator::new(cfg.frequency_grid()?, Arc::new(InspiralTaylorF2)))
}

fn cmd_simulate(config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let grid = cfg.frequency_grid()?;
    let generator = waveform_generator(&cfg)?;
    let start_time = cfg.start_time()?;
    let mut rng = cfg.noise_seed.map(StdRng::seed_from_u64);

    let mut interferometers = Vec::with_capacity(cfg.detectors.len());
    let mut network_snr_squared = 0.0;
    for name in &cfg.detectors {
        let mut ifo = simulate_interferometer(name, &grid, start_time, &cfg.psd, rng.as_mut())
            .with_context(|| format!("simulating {name}"))?;
        let snrs = ifo
            .inject_signal(&generator, &cfg.injection)
            .with_context(|| format!("injecting into {name}"))?;
        network_snr_squared += snrs.optimal_snr_squared;
        tracing::info!(
            detector = %name,
            optimal_snr = snrs.optimal_snr_squared.sqrt(),
            matched_filter_snr = snrs.complex_matched_filter_snr().norm(),
            "signal injected"
        );
        interferometers.push(ifo);
    }
    tracing::info!(network_optimal_snr = network_snr_squared.sqrt(), "simulation complete");

    let data = DetectorDataSet::from_interferometers(&interferometers);
    match output {
        Some(path) => {
            data.write_to(path).with_context(|| format!("writing {}", path.display()))?;
            Ok(())
        }
        None => write_json(None, serde_json::to_value(&data)?),
    }
}

fn cmd_bins(config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let grid = cfg.frequency_grid()?;
    let edges = BinEdges::from_grid(&grid, &cfg.binning)?;
    tracing::info!(n_bins = edges.n_bins(), grid_points = grid.n_valid(), "bin edges placed");

    let output_json = serde_json::json!({
        "n_bins": edges.n_bins(),
        "n_edges": edges.len(),
        "grid_points": grid.n_valid(),
        "indices": edges.indices(),
        "frequencies": edges.frequencies(),
        "binning": cfg.binning,
    });
    write_json(output, output_json)
}

fn build_likelihood(
    cfg: &RunConfig,
    data: &Path,
    fiducial: &Parameters,
) -> Result<RelativeBinningLikelihood> {
    tracing::info!(path = %data.display(), "loading detector data");
    let interferometers = DetectorDataSet::from_path(data)
        .and_then(|set| set.to_interferometers())
        .with_context(|| format!("loading detector data {}", data.display()))?;
    let mut transient = GravitationalWaveTransient::new(interferometers, waveform_generator(cfg)?)?;
    if cfg.marginalization != MarginalizationKind::None {
        let marginalization = Marginalization::new(cfg.marginalization, &cfg.prior_dict()?)
            .context("setting up marginalization")?;
        transient = transient.with_marginalization(marginalization);
    }
    let likelihood = RelativeBinningLikelihood::new(transient, &cfg.binning, fiducial)
        .context("building relative-binning likelihood")?
        .with_policy(cfg.degenerate_ratio_policy);
    tracing::info!(n_bins = likelihood.bin_edges().n_bins(), "relative-binning likelihood ready");
    Ok(likelihood)
}

fn cmd_fiducial(config: Option<&Path>, data: &Path, output: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let likelihood = build_likelihood(&cfg, data, cfg.fiducial_parameters())?;
    let result = search_fiducial(
        &likelihood,
        cfg.fiducial_parameters(),
        &cfg.search_bounds,
        &cfg.fiducial_search,
    )?;
    tracing::info!(
        log_likelihood_ratio = result.log_likelihood_ratio,
        iterations = result.history.len(),
        stop_reason = ?result.stop_reason,
        "fiducial search complete"
    );
    write_json(output, serde_json::to_value(&result)?)
}

fn cmd_sample(
    config: Option<&Path>,
    data: &Path,
    fiducial: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let cfg = load_config(config)?;
    let fiducial_parameters = match fiducial {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading fiducial {}", path.display()))?;
            let found: FiducialSearchResult = serde_json::from_str(&text)
                .with_context(|| format!("parsing fiducial {}", path.display()))?;
            found.parameters
        }
        None => cfg.fiducial_parameters().clone(),
    };

    let likelihood = build_likelihood(&cfg, data, &fiducial_parameters)?;
    let priors = likelihood.transient().marginalization().marginalized_priors(&cfg.prior_dict()?);
    tracing::info!(ndim = priors.ndim(), n_live = cfg.sampler.n_live, "starting nested sampling");

    let runs = if cfg.n_runs == 1 {
        vec![run_nested(&likelihood, &priors, &cfg.sampler)?]
    } else {
        run_nested_multi(&likelihood, &priors, &cfg.sampler, cfg.n_runs)?
    };
    for (i, run) in runs.iter().enumerate() {
        tracing::info!(
            run = i,
            log_evidence = run.log_evidence,
            log_evidence_err = run.log_evidence_err,
            log_bayes_factor = run.log_bayes_factor,
            "nested sampling complete"
        );
    }

    let output_json = serde_json::json!({
        "fiducial": fiducial_parameters,
        "fiducial_version": likelihood.fiducial().version(),
        "n_bins": likelihood.bin_edges().n_bins(),
        "marginalization": cfg.marginalization,
        "runs": runs,
    });
    write_json(output, output_json)
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

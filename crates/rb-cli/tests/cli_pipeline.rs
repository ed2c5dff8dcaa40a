use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_relbin"))
}

fn repo_root() -> PathBuf {
    // crates/rb-cli -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("relbin_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn run_ok(args: &[&str]) -> Output {
    let out = run(args);
    assert!(
        out.status.success(),
        "{:?} should succeed, stderr={}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    out
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON in {}: {e}", path.display()))
}

fn s(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[test]
fn version_smoke() {
    let out = run_ok(&["version"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("relbin "), "unexpected stdout: {stdout}");
}

#[test]
fn bins_writes_increasing_edges_to_stdout() {
    let config = fixture_path("bns_run.json");
    let out = run_ok(&["bins", "--config", &s(&config)]);
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout should be JSON");

    let n_bins = v["n_bins"].as_u64().unwrap() as usize;
    let indices: Vec<u64> =
        v["indices"].as_array().unwrap().iter().map(|x| x.as_u64().unwrap()).collect();
    let freqs: Vec<f64> =
        v["frequencies"].as_array().unwrap().iter().map(|x| x.as_f64().unwrap()).collect();
    assert_eq!(indices.len(), n_bins + 1);
    assert_eq!(freqs.len(), indices.len());
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
    assert!(n_bins < v["grid_points"].as_u64().unwrap() as usize);
    assert!(freqs[0] >= 20.0 && *freqs.last().unwrap() <= 400.0);
}

#[test]
fn pipeline_simulate_fiducial_sample() {
    let config = fixture_path("bns_run.json");
    let data = tmp_path("data.json");
    let fiducial = tmp_path("fiducial.json");
    let samples = tmp_path("samples.json");

    run_ok(&["simulate", "--config", &s(&config), "--output", &s(&data)]);
    let d = read_json(&data);
    let ifos = d["interferometers"].as_array().unwrap();
    assert_eq!(ifos.len(), 2);
    // f = 0..=fs/2 in steps of 1/T.
    assert_eq!(ifos[0]["strain"].as_array().unwrap().len(), 2049);
    assert_eq!(ifos[0]["psd"].as_array().unwrap().len(), 2049);

    run_ok(&["fiducial", "--config", &s(&config), "--data", &s(&data), "--output", &s(&fiducial)]);
    let f = read_json(&fiducial);
    let approx = f["log_likelihood_ratio"].as_f64().unwrap();
    let full = f["full_log_likelihood_ratio"].as_f64().unwrap();
    assert!((approx - full).abs() <= 1e-6 * full.abs().max(1.0), "{approx} vs {full}");
    let mc = f["parameters"]["chirp_mass"].as_f64().unwrap();
    assert!((1.1999..=1.2001).contains(&mc));
    assert!(!f["history"].as_array().unwrap().is_empty());

    run_ok(&[
        "sample",
        "--config",
        &s(&config),
        "--data",
        &s(&data),
        "--fiducial",
        &s(&fiducial),
        "--output",
        &s(&samples),
        "--threads",
        "2",
    ]);
    let r = read_json(&samples);
    assert_eq!(r["marginalization"], "phase");
    assert_eq!(r["fiducial"]["chirp_mass"].as_f64().unwrap(), mc);
    let runs = r["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert!(run["log_evidence"].as_f64().unwrap().is_finite());
    assert!(run["log_bayes_factor"].as_f64().unwrap() > 0.0, "loud injection should be favoured");
    assert_eq!(run["search_keys"], serde_json::json!(["chirp_mass", "luminosity_distance"]));
    assert!(!run["posterior"].as_array().unwrap().is_empty());

    for p in [data, fiducial, samples] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn missing_data_file_fails_with_context() {
    let config = fixture_path("bns_run.json");
    let out = run(&["fiducial", "--config", &s(&config), "--data", "/nonexistent/relbin.json"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("loading detector data"), "stderr={stderr}");
}

#[test]
fn invalid_config_is_rejected_before_work() {
    let config = tmp_path("bad.json");
    std::fs::write(&config, r#"{"detectors": ["X9"]}"#).unwrap();
    let out = run(&["bins", "--config", &s(&config)]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unknown detector"), "stderr={stderr}");
    let _ = std::fs::remove_file(config);
}

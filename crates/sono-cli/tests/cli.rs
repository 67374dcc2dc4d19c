//! CLI command integration tests.
//! Each test uses a temp directory via SONO_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Small, fast analysis settings so a handful of ticks finishes quickly.
const FAST_CONFIG: &str = r#"
update_rate_ms = 1
warmup_frames = 3
max_homology_points = 48

[pipeline]
sample_rate = 22050.0
fft_size = 512
num_mel_bins = 32
max_frames = 20
"#;

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sono.toml"), FAST_CONFIG).unwrap();
    dir
}

fn sono_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("sono").unwrap();
    cmd.env("SONO_DATA_DIR", data_dir.path());
    cmd
}

fn extract_stat_value(output: &str, prefix: &str) -> String {
    output
        .lines()
        .find(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("stat line starting with '{prefix}' not found in output:\n{output}"))
        .split_whitespace()
        .last()
        .unwrap()
        .to_string()
}

#[test]
fn stats_fresh_db_has_default_species() {
    let dir = data_dir();
    let output = sono_cmd(&dir).arg("stats").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "species:"), "2");
    assert_eq!(extract_stat_value(&stdout, "signatures:"), "0");
    assert!(stdout.contains("bird"));
    assert!(stdout.contains("whale"));
}

#[test]
fn species_list_and_category_filter() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["species", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example_bird_1"))
        .stdout(predicate::str::contains("example_whale_1"));

    sono_cmd(&dir)
        .args(["species", "list", "--category", "whale"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example_whale_1"))
        .stdout(predicate::str::contains("example_bird_1").not());
}

#[test]
fn species_show_unknown_fails() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["species", "show", "dodo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown species: dodo"));
}

#[test]
fn species_add_persists_and_is_searchable() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args([
            "species",
            "add",
            "--id",
            "wren",
            "--name",
            "Winter Wren",
            "--scientific-name",
            "Troglodytes hiemalis",
            "--category",
            "bird",
            "--low",
            "2500",
            "--high",
            "9000",
            "--tag",
            "forest",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("added species wren"));

    sono_cmd(&dir)
        .args(["species", "search", "troglodytes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wren"));

    sono_cmd(&dir)
        .args(["species", "show", "wren"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2500-9000 Hz"))
        .stdout(predicate::str::contains("forest"));

    let output = sono_cmd(&dir).arg("stats").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "species:"), "3");
}

#[test]
fn species_add_rejects_inverted_range() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["species", "add", "--id", "bad", "--low", "900", "--high", "100"])
        .assert()
        .failure();
}

#[test]
fn analyze_prints_summary() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["analyze", "--ticks", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ticks:       8 (6 analyzed)"))
        .stdout(predicate::str::contains("barcodes:"))
        .stdout(predicate::str::contains("currents:"));
}

#[test]
fn analyze_json_output_parses() {
    let dir = data_dir();
    let output = sono_cmd(&dir)
        .args(["analyze", "--ticks", "10", "--source", "whale", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["ticks"], 10);
    assert_eq!(v["analyzed"], 8);
    assert!(v["features"]["bass"].as_f64().unwrap() > 0.0);
    assert_eq!(v["state"]["isAnalyzing"], false);
}

#[test]
fn analyze_during_warmup_reports_it() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["analyze", "--ticks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("still warming up"));
}

#[test]
fn analyze_raw_input_file() {
    let dir = data_dir();
    let input = dir.path().join("tone.f32");
    let bytes: Vec<u8> = (0..22_050)
        .flat_map(|i| {
            let t = i as f32 / 22_050.0;
            (0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()).to_le_bytes()
        })
        .collect();
    std::fs::write(&input, bytes).unwrap();

    sono_cmd(&dir)
        .args(["analyze", "--ticks", "6", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("features:"));
}

#[test]
fn analyze_missing_input_fails() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["analyze", "--input"])
        .arg(dir.path().join("nope.f32"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn analyze_rejects_non_finite_noise() {
    let dir = data_dir();
    for noise in ["--noise=NaN", "--noise=inf", "--noise=-0.1"] {
        sono_cmd(&dir)
            .args(["analyze", "--ticks", "2", noise])
            .assert()
            .failure()
            .stderr(predicate::str::contains("noise amplitude must be finite"));
    }
}

#[test]
fn compare_requires_signatures() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["compare", "example_bird_1", "example_whale_1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no signatures"));
}

#[test]
fn capture_then_compare() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["analyze", "--ticks", "8", "--capture", "example_bird_1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("captured signature"));
    sono_cmd(&dir)
        .args([
            "analyze",
            "--ticks",
            "8",
            "--source",
            "whale",
            "--capture",
            "example_whale_1",
        ])
        .assert()
        .success();

    let output = sono_cmd(&dir)
        .args(["compare", "example_bird_1", "example_whale_1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let similarity: f64 = extract_stat_value(&stdout, "similarity:").parse().unwrap();
    assert!((0.0..=1.0).contains(&similarity));
    let shift: f64 = extract_stat_value(&stdout, "frequency shift:").parse().unwrap();
    assert!(shift < 0.1, "whale sits far below the songbird: {shift}");

    let stats = sono_cmd(&dir).arg("stats").output().unwrap();
    let stats = String::from_utf8_lossy(&stats.stdout);
    assert_eq!(extract_stat_value(&stats, "signatures:"), "2");
}

#[test]
fn capture_unknown_species_fails() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["analyze", "--ticks", "5", "--capture", "dodo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown species"));
}

#[test]
fn verify_reports_agreement() {
    let dir = data_dir();
    sono_cmd(&dir)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("check:    structural"))
        .stdout(predicate::str::contains("verified: true"));
}

#[test]
fn export_import_roundtrip() {
    let src = data_dir();
    sono_cmd(&src)
        .args(["analyze", "--ticks", "6", "--capture", "example_bird_1"])
        .assert()
        .success();

    let export_path = src.path().join("bird.json");
    sono_cmd(&src)
        .args(["export", "example_bird_1"])
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported example_bird_1"));

    let json = std::fs::read_to_string(&export_path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["version"], "1");
    assert_eq!(v["species"]["id"], "example_bird_1");

    let dst = data_dir();
    sono_cmd(&dst)
        .arg("import")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported example_bird_1"));

    let stats = sono_cmd(&dst).arg("stats").output().unwrap();
    let stats = String::from_utf8_lossy(&stats.stdout);
    assert_eq!(extract_stat_value(&stats, "species:"), "2");
    assert_eq!(extract_stat_value(&stats, "signatures:"), "1");
}

#[test]
fn import_malformed_fails() {
    let dir = data_dir();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    sono_cmd(&dir)
        .arg("import")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to import"));
}

#[test]
fn export_unknown_species_fails() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["export", "dodo"])
        .arg(dir.path().join("dodo.json"))
        .assert()
        .failure();
}

#[test]
fn reset_restores_defaults() {
    let dir = data_dir();
    sono_cmd(&dir)
        .args(["species", "add", "--id", "owl"])
        .assert()
        .success();
    sono_cmd(&dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 default species"));

    sono_cmd(&dir)
        .args(["species", "show", "owl"])
        .assert()
        .failure();
}

#[test]
fn malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sono.toml"), "warmup_frames = \"many\"").unwrap();
    sono_cmd(&dir)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load sono.toml"));
}

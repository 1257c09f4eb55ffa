//! Integration tests for the uscalc binary.
//!
//! These tests verify end-to-end behavior including:
//! - Readout formatting for the reference scenarios
//! - Validation failures and advisory warnings
//! - JSON output and configuration overrides
//! - CSV batch evaluation

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a test directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the CLI with an empty config file
fn cli(dir: &TempDir) -> Command {
    let config_path = dir.path().join("config.toml");
    if !config_path.exists() {
        fs::write(&config_path, "").expect("Failed to write config");
    }
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("uscalc"));
    cmd.arg("--config").arg(config_path);
    cmd
}

fn scenario_a(cmd: &mut Command) -> &mut Command {
    cmd.args([
        "calc",
        "--frequency",
        "1.5",
        "--depth",
        "2",
        "--pnp",
        "1.0",
        "--pd",
        "2",
        "--pd-unit",
        "us",
        "--prf",
        "1",
        "--prf-unit",
        "khz",
    ])
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("uscalc"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ultrasound acoustic output calculator"));
}

#[test]
fn test_scenario_a_readout() {
    let dir = setup_test_dir();
    scenario_a(&mut cli(&dir))
        .assert()
        .success()
        .stdout(predicate::str::contains("0.9016 MPa"))
        .stdout(predicate::str::contains("0.7361"))
        .stdout(predicate::str::contains("0.4519 MPa"))
        .stdout(predicate::str::contains("0.3689"))
        .stdout(predicate::str::contains("0.200%  (f=0.002000)"))
        .stdout(predicate::str::contains("6.00 dB  •  7.00 mm"));
}

#[test]
fn test_zero_frequency_is_rejected() {
    let dir = setup_test_dir();
    cli(&dir)
        .args([
            "calc", "--frequency", "0", "--depth", "2", "--pnp", "1", "--pd", "2", "--prf", "1",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("—"))
        .stdout(predicate::str::contains("MPa").not())
        .stderr(predicate::str::contains(
            "Enter a number greater than 0 for frequency (MHz).",
        ));
}

#[test]
fn test_negative_required_field_is_rejected() {
    let dir = setup_test_dir();
    cli(&dir)
        .args([
            "calc", "--frequency", "1", "--depth", "-2", "--pnp", "1", "--pd", "2", "--prf", "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-negative number for depth (cm)"));
}

#[test]
fn test_missing_required_field_is_rejected() {
    let dir = setup_test_dir();
    cli(&dir)
        .args(["calc", "--frequency", "1", "--depth", "2", "--pnp", "1", "--pd", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Enter a value for pulse repetition frequency.",
        ));
}

#[test]
fn test_duty_cycle_warning_still_computes() {
    let dir = setup_test_dir();
    cli(&dir)
        .args([
            "calc",
            "--frequency",
            "1.5",
            "--depth",
            "2",
            "--pnp",
            "1.0",
            "--pd",
            "1.5",
            "--pd-unit",
            "ms",
            "--prf",
            "1",
            "--prf-unit",
            "khz",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("150.000%  (f=1.500000)"))
        .stdout(predicate::str::contains("duty cycle > 100%"));
}

#[test]
fn test_blank_optional_fields_use_defaults() {
    let dir = setup_test_dir();
    scenario_a(&mut cli(&dir))
        .args(["--insertion-loss", "", "--skull", "n/a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6.00 dB  •  7.00 mm"));
}

#[test]
fn test_config_overrides_defaults() {
    let dir = setup_test_dir();
    fs::write(
        dir.path().join("config.toml"),
        "[defaults]\ninsertion_loss_db = 3.0\nskull_thickness_mm = 5.5\n",
    )
    .unwrap();

    scenario_a(&mut cli(&dir))
        .assert()
        .success()
        .stdout(predicate::str::contains("3.00 dB  •  5.50 mm"));
}

#[test]
fn test_bad_custom_impedance_matches_water() {
    let dir = setup_test_dir();
    let water = scenario_a(&mut cli(&dir)).output().unwrap();
    let custom = scenario_a(&mut cli(&dir))
        .args(["--impedance", "custom", "--custom-impedance", "zero"])
        .output()
        .unwrap();

    assert!(custom.status.success());
    assert_eq!(water.stdout, custom.stdout);
}

#[test]
fn test_json_output() {
    let dir = setup_test_dir();
    let output = scenario_a(&mut cli(&dir)).arg("--json").output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "ready");
    assert_eq!(value["readout"]["mechanical_index"], "0.7361");
    assert_eq!(value["inputs"]["impedance"]["kind"], "water");
    assert!(value["advisories"].as_array().unwrap().is_empty());
}

#[test]
fn test_identical_runs_give_identical_output() {
    let dir = setup_test_dir();
    let first = scenario_a(&mut cli(&dir)).output().unwrap();
    let second = scenario_a(&mut cli(&dir)).output().unwrap();
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_copy_failure_is_reported_without_touching_results() {
    let dir = setup_test_dir();
    fs::write(
        dir.path().join("config.toml"),
        "[clipboard]\ncommand = [\"uscalc-no-such-clipboard-program\"]\n",
    )
    .unwrap();

    scenario_a(&mut cli(&dir))
        .arg("--copy")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.9016 MPa"))
        .stderr(predicate::str::contains("Clipboard access blocked"));
}

#[cfg(unix)]
#[test]
fn test_copy_writes_results_block() {
    let dir = setup_test_dir();
    let sink = dir.path().join("clipboard.txt");
    fs::write(
        dir.path().join("config.toml"),
        format!(
            "[clipboard]\ncommand = [\"sh\", \"-c\", \"cat > '{}'\"]\n",
            sink.display()
        ),
    )
    .unwrap();

    scenario_a(&mut cli(&dir))
        .arg("--copy")
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied to clipboard."));

    let copied = fs::read_to_string(&sink).unwrap();
    assert!(copied.starts_with("Ultrasound Output Calculator\nfc: 1.5 MHz"));
    assert!(copied.contains("Pr.3: 0.9016 MPa"));
    assert!(copied.contains("ISPTA: 0.067568 W/cm²"));
}

#[test]
fn test_batch_to_file() {
    let dir = setup_test_dir();
    let input = dir.path().join("settings.csv");
    let output = dir.path().join("results.csv");
    fs::write(
        &input,
        "frequency_mhz,depth_cm,peak_negative_pressure_mpa,pulse_duration,pulse_duration_unit,prf,prf_unit\n\
         1.5,2,1.0,2,us,1,khz\n\
         -1,2,1.0,2,us,1,khz\n",
    )
    .unwrap();

    cli(&dir)
        .arg("batch")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Evaluated 2 rows (1 ok, 0 with warnings, 1 invalid)"));

    let csv = fs::read_to_string(&output).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("0.9016 MPa"));
    assert!(csv.contains("invalid"));
}

#[test]
fn test_batch_to_stdout() {
    let dir = setup_test_dir();
    let input = dir.path().join("settings.csv");
    fs::write(
        &input,
        "frequency_mhz,depth_cm,peak_negative_pressure_mpa,pulse_duration,prf\n1,0,1,1,1\n",
    )
    .unwrap();

    cli(&dir)
        .arg("batch")
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains(",ok,"));
}

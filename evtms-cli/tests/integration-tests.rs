use std::fs;
use std::process::Command;

use assert_cmd::prelude::{CommandCargoExt, OutputAssertExt};
use predicates::prelude::predicate;

#[test]
fn test_that_cli_app_prints_summary() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("evtms-cli")?;
    cmd.args(["--params", r#"{"sim": {"duration_s": 60.0}}"#, "--cop", "3.0"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("chiller_on_frac"))
        .stdout(predicate::str::contains("\"n_points\":61"));

    Ok(())
}

#[test]
fn test_that_cli_app_writes_csv_results() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out_file = dir.path().join("results.csv");

    let mut cmd = Command::cargo_bin("evtms-cli")?;
    cmd.args([
        "--params",
        r#"{"sim": {"duration_s": 30.0}}"#,
        "--out-file",
        out_file.to_str().unwrap(),
    ]);
    cmd.assert().success().stdout(predicate::str::is_empty());

    let contents = fs::read_to_string(&out_file)?;
    let mut lines = contents.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("time_s,motor_te_deg_c"));
    assert!(header.contains("comp_pwr_elec_w"));
    assert_eq!(lines.count(), 31);

    Ok(())
}

#[test]
fn test_that_default_params_round_trip_through_cli() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let params_file = dir.path().join("params.yaml");

    let mut cmd = Command::cargo_bin("evtms-cli")?;
    cmd.args(["--write-default-params", params_file.to_str().unwrap()]);
    cmd.assert().success();
    assert!(fs::read_to_string(&params_file)?.contains("ramp_up_time_s"));

    let mut cmd = Command::cargo_bin("evtms-cli")?;
    cmd.args([
        "--params-file",
        params_file.to_str().unwrap(),
        "--summary",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"n_points\":2101"));

    Ok(())
}

#[test]
fn test_that_invalid_params_fail() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("evtms-cli")?;
    cmd.args(["--params", r#"{"sim": {"dt_s": 0.0}}"#]);
    cmd.assert().failure();

    Ok(())
}

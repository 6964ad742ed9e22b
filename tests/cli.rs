// tests/cli.rs
//! Office remover CLI tests.

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn remover() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("office-remover")?;
    cmd.env("NO_COLOR", "1");
    Ok(cmd)
}

#[test]
fn missing_product_type_is_invalid() -> TestResult {
    let tmp = tempfile::tempdir()?;
    remover()?
        .current_dir(tmp.path())
        .args(["-o", "16"])
        .assert()
        .code(2)
        .stderr(contains("--office-product-type"));
    assert!(!tmp.path().join("log").exists());
    Ok(())
}

#[test]
fn unsupported_version_is_invalid() -> TestResult {
    let tmp = tempfile::tempdir()?;
    remover()?
        .current_dir(tmp.path())
        .args(["-p", "ClickToRun", "-o", "13", "-m", "Remove"])
        .assert()
        .code(2)
        .stderr(contains("13"));
    Ok(())
}

#[test]
fn every_problem_is_reported_at_once() -> TestResult {
    remover()?
        .args(["-p", "Floppy", "-o", "11", "-m", "Erase", "-s", "Loud"])
        .assert()
        .code(2)
        .stderr(contains("Floppy"))
        .stderr(contains("11"))
        .stderr(contains("Erase"))
        .stderr(contains("Loud"));
    Ok(())
}

#[test]
fn unknown_flag_is_a_usage_error() -> TestResult {
    remover()?
        .args(["-p", "MSI", "-o", "16", "--purge-everything"])
        .assert()
        .code(2)
        .stderr(contains("Usage:"));
    Ok(())
}

#[test]
fn detect_creates_the_log_file() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let log_dir = tmp.path().join("logs");
    remover()?
        .args(["-p", "WindowsInstaller", "-o", "16", "-m", "Detect", "-c"])
        .arg("-l")
        .arg(&log_dir)
        .assert()
        .success();

    let log = std::fs::read_to_string(log_dir.join("office-remover.log"))?;
    assert!(log.lines().all(|line| serde_json::from_str::<serde_json::Value>(line).is_ok()));
    assert!(log.contains("detect.result"));
    Ok(())
}

#[test]
fn banner_is_suppressed_by_flag() -> TestResult {
    let tmp = tempfile::tempdir()?;
    remover()?
        .args(["-p", "Store", "-o", "16", "-c", "-l"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(contains("Copyright").not());
    Ok(())
}

#[cfg(not(windows))]
#[test]
fn detect_on_host_without_office_reports_absent() -> TestResult {
    let tmp = tempfile::tempdir()?;
    remover()?
        .args(["-p", "WindowsInstaller", "-o", "16"])
        .arg("-l")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(contains("Copyright"))
        .stdout(contains("Absent"));
    Ok(())
}

#[cfg(not(windows))]
#[test]
fn remove_without_elevation_is_denied() -> TestResult {
    let tmp = tempfile::tempdir()?;
    remover()?
        .args(["-p", "ClickToRun", "-o", "16", "-m", "Remove", "-k", "-r"])
        .arg("-l")
        .arg(tmp.path())
        .assert()
        .code(3)
        .stderr(contains("Elevation Denied"));
    Ok(())
}

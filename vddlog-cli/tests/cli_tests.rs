#![allow(clippy::unwrap_used)]
//! Integration tests for the `vddlog` binary.
//!
//! These tests cover:
//! - `--help` exits 0
//! - Missing or conflicting input options exit 2
//! - Missing suite file exits 3, missing suite directory exits 4
//! - Successful run writes both reports next to the input
//! - Unwritable output directory exits 1

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn vddlog(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vddlog"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_run(dir: &Path) {
    fs::write(
        dir.join("ok.log"),
        "[T](*)Assert Passed: 'title'\n\
         [T](*)Soda Test Report--testlog:ok.log--result:0--isrestart:false\
         --failedasserts:0--exceptions:0--errors:0--blocked:0--passedasserts:1\
         --watchdog:0\n",
    )
    .unwrap();
    fs::write(
        dir.join("Login.xml"),
        "<data><suite><suitefile>Login.xml</suitefile>\
         <test><testlog>ok.log</testlog></test>\
         <runtime>0:00:04</runtime></suite></data>\n",
    )
    .unwrap();
}

#[test]
fn test_help_exits_zero() {
    let out = vddlog(&["--help"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--suitefile"));
    assert!(stdout.contains("--suitedir"));
}

#[test]
fn test_no_input_is_usage_error() {
    let out = vddlog(&[]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_both_inputs_is_usage_error() {
    let out = vddlog(&["--suitefile=a.xml", "--suitedir=."]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_missing_suite_file_exits_three() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("Nope.xml");
    let out = vddlog(&["--suitefile", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
}

#[test]
fn test_missing_suite_dir_exits_four() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    let out = vddlog(&["--suitedir", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn test_suitefile_writes_reports_next_to_input() {
    let tmp = TempDir::new().unwrap();
    write_run(tmp.path());

    let suite = tmp.path().join("Login.xml");
    let out = vddlog(&["--suitefile", suite.to_str().unwrap()]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let summary = fs::read_to_string(tmp.path().join("summary.txt")).unwrap();
    assert!(summary.contains("Login"));
    assert!(summary.contains("0:00:04"));
    assert!(tmp.path().join("issues.txt").is_file());
}

#[test]
fn test_suitedir_json_output_dir() {
    let tmp = TempDir::new().unwrap();
    write_run(tmp.path());
    let out_dir = TempDir::new().unwrap();

    let out = vddlog(&[
        "--suitedir",
        tmp.path().to_str().unwrap(),
        "--output-dir",
        out_dir.path().to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(out.status.code(), Some(0));

    let text = fs::read_to_string(out_dir.path().join("summary.json")).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(summary["totals"]["passed"], 1);
    assert_eq!(summary["totals"]["passed_asserts"], 1);
    assert!(out_dir.path().join("issues.json").is_file());
}

#[test]
fn test_unwritable_output_exits_one() {
    let tmp = TempDir::new().unwrap();
    write_run(tmp.path());
    let missing_out = tmp.path().join("no-such-dir");

    let suite = tmp.path().join("Login.xml");
    let out = vddlog(&[
        "--suitefile",
        suite.to_str().unwrap(),
        "--output-dir",
        missing_out.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to write"));
}

//! Integration tests for the dimspect CLI
//!
//! These tests exercise the commands end-to-end using assert_cmd, each in a
//! scratch directory so the default output paths stay isolated.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get a dimspect command running inside `dir`
fn dimspect(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dimspect").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("DIMSPECT_ABS_TOL_MM")
        .env_remove("DIMSPECT_REL_TOL_PCT");
    cmd
}

/// Bearing drawing in millimeters: OD 30, bore 14
const BEARING_DXF: &str = "0\nSECTION\n2\nHEADER\n9\n$INSUNITS\n70\n4\n0\nENDSEC\n\
0\nSECTION\n2\nENTITIES\n\
0\nCIRCLE\n8\n0\n10\n0\n20\n0\n40\n15.0\n\
0\nCIRCLE\n8\n0\n10\n0\n20\n0\n40\n7.0\n\
0\nENDSEC\n0\nEOF\n";

/// Square washer drawing: 40 x 40 outline from LINEs, bore 16
const SQUARE_DXF: &str = "0\nSECTION\n2\nENTITIES\n\
0\nLINE\n10\n0\n20\n0\n11\n40\n21\n0\n\
0\nLINE\n10\n40\n20\n0\n11\n40\n21\n40\n\
0\nLINE\n10\n40\n20\n40\n11\n0\n21\n40\n\
0\nLINE\n10\n0\n20\n40\n11\n0\n21\n0\n\
0\nCIRCLE\n10\n20\n20\n20\n40\n8.0\n\
0\nENDSEC\n0\nEOF\n";

fn bearing_roi(inner_r: f64) -> String {
    format!(
        "{{\"width\":200,\"height\":200,\"circles\":[\
{{\"center\":[100,100],\"radius\":60}},\
{{\"center\":[100,100],\"radius\":{}}}]}}",
        inner_r
    )
}

/// Two bearing frames: the first in tolerance, the second with an oversize bore
fn bearing_frames() -> String {
    format!(
        "{{\"timestamp\":\"2025-01-01T10:00:00Z\",\"rois\":[{}]}}\n\
{{\"timestamp\":\"2025-01-01T10:00:01Z\",\"rois\":[]}}\n\
{{\"timestamp\":\"2025-01-01T10:00:02Z\",\"rois\":[{}]}}\n",
        bearing_roi(28.0),
        bearing_roi(36.0)
    )
}

fn setup_bearing() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bearing.dxf"), BEARING_DXF).unwrap();
    fs::write(tmp.path().join("frames.jsonl"), bearing_frames()).unwrap();
    tmp
}

// ============================================================================
// Extract
// ============================================================================

#[test]
fn test_extract_writes_nominal_table() {
    let tmp = setup_bearing();

    dimspect(tmp.path())
        .args(["extract", "bearing.dxf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BEARING"))
        .stdout(predicate::str::contains("outer_diameter"));

    let nominal = fs::read_to_string(tmp.path().join("dxf_measurements.csv")).unwrap();
    assert_eq!(
        nominal,
        "type,value_mm\nouter_diameter,30\ninner_diameter,14\n"
    );
}

#[test]
fn test_extract_square_washer_as_json() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("square.dxf"), SQUARE_DXF).unwrap();

    let output = dimspect(tmp.path())
        .args(["extract", "square.dxf", "--no-write", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let spec: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(spec["part_type"], "square_washer");
    assert_eq!(spec["dimensions"]["outer_width"], 40.0);
    assert_eq!(spec["dimensions"]["inner_diameter"], 16.0);
    assert!(!tmp.path().join("dxf_measurements.csv").exists());
}

#[test]
fn test_extract_rejects_unsupported_format() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("part.step"), "ISO-10303-21;").unwrap();
    fs::write(tmp.path().join("part.stl"), "solid part\nendsolid part\n").unwrap();

    dimspect(tmp.path())
        .args(["extract", "part.step"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported CAD format"));

    dimspect(tmp.path())
        .args(["extract", "part.stl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STL"));
}

#[test]
fn test_extract_without_circles_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("empty.dxf"),
        "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n0\n20\n0\n11\n5\n21\n0\n0\nENDSEC\n0\nEOF\n",
    )
    .unwrap();

    dimspect(tmp.path())
        .args(["extract", "empty.dxf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CIRCLE"));
}

// ============================================================================
// Inspect
// ============================================================================

#[test]
fn test_inspect_logs_measurements_and_sidecar() {
    let tmp = setup_bearing();
    dimspect(tmp.path())
        .args(["extract", "bearing.dxf", "-q"])
        .assert()
        .success();

    dimspect(tmp.path())
        .args(["inspect", "--frames", "frames.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT DEFECTIVE"))
        .stdout(predicate::str::contains("Final verdict:"));

    let log = fs::read_to_string(tmp.path().join("cleaned_output.csv")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "timestamp,outer_diameter_mm,inner_diameter_mm");
    assert_eq!(lines.len(), 3);

    let raw = fs::read_to_string(tmp.path().join("measured_output.csv")).unwrap();
    assert!(raw.lines().next().unwrap().ends_with("mm_per_px"));

    let live = fs::read_to_string(tmp.path().join("current_measurement.txt")).unwrap();
    assert!(live.starts_with("OBJECT: BEARING\n"));
    assert!(live.contains("STATUS: DEFECTIVE"));
}

#[test]
fn test_inspect_summary_as_json() {
    let tmp = setup_bearing();

    let output = dimspect(tmp.path())
        .args([
            "inspect",
            "--cad",
            "bearing.dxf",
            "--frames",
            "frames.jsonl",
            "--no-raw",
            "--no-live-status",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["stats"]["frames"], 3);
    assert_eq!(summary["stats"]["measurements"], 2);
    assert_eq!(summary["report"]["stats"]["defective"], 1);
    let scale = summary["scale_mm_per_px"].as_f64().unwrap();
    assert!((scale - 31.0 / 120.0).abs() < 1e-9);

    assert!(!tmp.path().join("measured_output.csv").exists());
    assert!(!tmp.path().join("current_measurement.txt").exists());
}

#[test]
fn test_inspect_max_frames_and_fresh_log() {
    let tmp = setup_bearing();

    for _ in 0..2 {
        dimspect(tmp.path())
            .args([
                "inspect",
                "--cad",
                "bearing.dxf",
                "--frames",
                "frames.jsonl",
                "--max-frames",
                "1",
                "--fresh",
                "-q",
            ])
            .assert()
            .success();
    }

    let log = fs::read_to_string(tmp.path().join("cleaned_output.csv")).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn test_inspect_live_mode() {
    let tmp = setup_bearing();

    dimspect(tmp.path())
        .args([
            "inspect",
            "--cad",
            "bearing.dxf",
            "--frames",
            "frames.jsonl",
            "--live",
            "--frame-interval-ms",
            "20",
            "--timeout-secs",
            "30",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scale:"));

    assert!(tmp.path().join("cleaned_output.csv").exists());
}

#[test]
fn test_inspect_skips_malformed_frames() {
    let tmp = setup_bearing();
    let mut frames = bearing_frames();
    frames.insert_str(0, "{this is not a frame}\n");
    fs::write(tmp.path().join("frames.jsonl"), frames).unwrap();

    dimspect(tmp.path())
        .args(["inspect", "--cad", "bearing.dxf", "--frames", "frames.jsonl"])
        .assert()
        .success()
        .stderr(predicate::str::contains("malformed"));
}

#[test]
fn test_inspect_requires_nominal() {
    let tmp = setup_bearing();

    dimspect(tmp.path())
        .args(["inspect", "--frames", "frames.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dxf_measurements.csv"));
}

// ============================================================================
// Compare
// ============================================================================

fn write_nominal_and_log(dir: &Path) {
    fs::write(
        dir.join("dxf_measurements.csv"),
        "type,value_mm\nouter_diameter,30\ninner_diameter,14\n",
    )
    .unwrap();
    fs::write(
        dir.join("cleaned_output.csv"),
        "timestamp,outer_diameter_mm,inner_diameter_mm\n\
2025-01-01T10:00:00Z,30.4,14.2\n\
2025-01-01T10:00:01Z,31.5,14.1\n",
    )
    .unwrap();
}

#[test]
fn test_compare_writes_report() {
    let tmp = TempDir::new().unwrap();
    write_nominal_and_log(tmp.path());

    dimspect(tmp.path())
        .arg("compare")
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT DEFECTIVE"))
        .stdout(predicate::str::contains("| outer_diameter"));

    let report = fs::read_to_string(tmp.path().join("component_comparison_report.csv")).unwrap();
    let header = report.lines().next().unwrap();
    assert!(header.starts_with("timestamp,CAD_outer_diameter_mm,MEAS_outer_diameter_mm"));
    assert!(header.contains("inner_diameter_mm_rel_err_percent"));
    assert!(header.ends_with(",status"));
    assert_eq!(report.lines().count(), 3);
}

#[test]
fn test_compare_tolerance_flags_and_fail_on_defect() {
    let tmp = TempDir::new().unwrap();
    write_nominal_and_log(tmp.path());

    dimspect(tmp.path())
        .args(["compare", "--abs-tol", "1.0", "--fail-on-defect", "-o", "strict.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DEFECTIVE"));

    let report = fs::read_to_string(tmp.path().join("strict.csv")).unwrap();
    assert!(report.lines().last().unwrap().ends_with(",DEFECTIVE"));
}

#[test]
fn test_compare_respects_project_config() {
    let tmp = TempDir::new().unwrap();
    write_nominal_and_log(tmp.path());
    fs::write(
        tmp.path().join("dimspect.yaml"),
        "tolerance:\n  abs_tol_mm: 1.0\n",
    )
    .unwrap();

    dimspect(tmp.path())
        .args(["compare", "--fail-on-defect"])
        .assert()
        .failure();

    dimspect(tmp.path())
        .args(["compare", "--fail-on-defect"])
        .env("DIMSPECT_ABS_TOL_MM", "2.0")
        .assert()
        .success();
}

#[test]
fn test_compare_csv_format() {
    let tmp = TempDir::new().unwrap();
    write_nominal_and_log(tmp.path());

    dimspect(tmp.path())
        .args(["compare", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "dimension,count,mean_abs_err_mm,max_abs_err_mm\n",
        ));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_run_end_to_end() {
    let tmp = setup_bearing();

    dimspect(tmp.path())
        .args(["run", "bearing.dxf", "--frames", "frames.jsonl", "--fresh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Classified"))
        .stdout(predicate::str::contains("Final verdict:"));

    for file in [
        "dxf_measurements.csv",
        "cleaned_output.csv",
        "measured_output.csv",
        "component_comparison_report.csv",
        "current_measurement.txt",
    ] {
        assert!(tmp.path().join(file).exists(), "{} missing", file);
    }

    let report = fs::read_to_string(tmp.path().join("component_comparison_report.csv")).unwrap();
    let rows: Vec<&str> = report.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].ends_with(",NOT DEFECTIVE"));
    assert!(rows[1].ends_with(",DEFECTIVE"));
}

#[test]
fn test_run_fail_on_defect() {
    let tmp = setup_bearing();

    dimspect(tmp.path())
        .args([
            "run",
            "bearing.dxf",
            "--frames",
            "frames.jsonl",
            "--fail-on-defect",
            "-q",
        ])
        .assert()
        .failure();
}

// ============================================================================
// Config & completions
// ============================================================================

#[test]
fn test_config_show_and_set() {
    let tmp = TempDir::new().unwrap();

    dimspect(tmp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abs_tol_mm: 2.0"))
        .stdout(predicate::str::contains("cleaned_output.csv"));

    dimspect(tmp.path())
        .args(["config", "set", "tolerance.rel_tol_pct", "5"])
        .assert()
        .success();

    dimspect(tmp.path())
        .args(["config", "show", "tolerance.rel_tol_pct"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5"));

    dimspect(tmp.path())
        .args(["config", "set", "tolerance.abs_tol_mm", "wide"])
        .assert()
        .failure();

    dimspect(tmp.path())
        .args(["config", "unset", "tolerance.rel_tol_pct"])
        .assert()
        .success();
}

#[test]
fn test_config_path_lists_project_file() {
    let tmp = TempDir::new().unwrap();

    dimspect(tmp.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dimspect.yaml"));
}

#[test]
fn test_malformed_project_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("dimspect.yaml"), "tolerance: [oops").unwrap();

    dimspect(tmp.path())
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dimspect.yaml"));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();

    dimspect(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dimspect"));
}

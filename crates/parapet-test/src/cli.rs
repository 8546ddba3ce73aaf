//! CLI regression tests for the `parapet` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes and output formats.
//!
//! Run with: `cargo test -p parapet-test`
//! Requires the `parapet` binary to be built first (`cargo build -p parapet`).

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `parapet` binary.
fn parapet() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("parapet").expect("parapet binary not found, run `cargo build -p parapet`")
}

/// Absolute path to the shared test fixtures directory.
fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/parapet-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/")
        .parent()
        .expect("workspace root")
        .join("tests/fixtures")
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let s = String::from_utf8(output.stdout.clone()).expect("stdout should be valid UTF-8");
    serde_json::from_str(&s).expect("stdout should be valid JSON")
}

// ---------------------------------------------------------------------------
// parapet check
// ---------------------------------------------------------------------------

#[test]
fn check_valid_document_exits_zero() {
    parapet()
        .args(["check", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .success()
        .stderr(contains("is valid"));
}

#[test]
fn check_recursive_schema_is_valid() {
    parapet()
        .args(["check", "--spec"])
        .arg(fixtures().join("cyclic.yaml"))
        .assert()
        .success();
}

#[test]
fn check_missing_file_exits_one() {
    parapet()
        .args(["check", "--spec", "this-file-does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("cannot read"));
}

#[test]
fn check_syntax_error_exits_one() {
    parapet()
        .args(["check", "--spec"])
        .arg(fixtures().join("invalid-syntax.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("cannot parse"));
}

#[test]
fn check_dangling_reference_reports_its_pointer() {
    parapet()
        .args(["check", "--spec"])
        .arg(fixtures().join("dangling-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("#/channels/orders/publish/message"))
        .stderr(contains("OrderPlaced"));
}

#[test]
fn check_external_reference_needs_the_other_file() {
    parapet()
        .args(["check", "--spec"])
        .arg(fixtures().join("uses-common.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("common.yaml"));

    parapet()
        .args(["check", "--spec"])
        .arg(fixtures().join("uses-common.yaml"))
        .arg(fixtures().join("common.yaml"))
        .assert()
        .success()
        .stderr(contains("checked 2 document(s): 2 valid, 0 invalid"));
}

#[test]
fn check_json_format_outputs_valid_json() {
    let output = parapet()
        .args(["check", "--format", "json", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(v["summary"]["total"], 1);
    assert_eq!(v["results"][0]["valid"], true);
    assert_eq!(v["results"][0]["version"], "2.6.0");
}

#[test]
fn check_json_format_lists_errors_with_pointers() {
    let output = parapet()
        .args(["check", "--format", "json", "--spec"])
        .arg(fixtures().join("dangling-ref.yaml"))
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .failure()
        .code(1)
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(v["summary"]["invalid"], 1);
    let results = v["results"].as_array().expect("results should be an array");
    let dangling = results
        .iter()
        .find(|r| r["file"].as_str().is_some_and(|f| f.ends_with("dangling-ref.yaml")))
        .expect("dangling-ref.yaml result");
    assert_eq!(dangling["valid"], false);
    assert_eq!(
        dangling["errors"][0]["pointer"],
        "#/channels/orders/publish/message"
    );
}

#[test]
fn check_without_spec_exits_two() {
    parapet().args(["check"]).assert().failure().code(2);
}

// ---------------------------------------------------------------------------
// parapet fmt
// ---------------------------------------------------------------------------

#[test]
fn fmt_keeps_references_by_default() {
    let output = parapet()
        .args(["fmt", "--output-format", "json", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(v["asyncapi"], "2.6.0");
    assert_eq!(
        v["channels"]["ping"]["publish"]["message"]["$ref"],
        "#/components/messages/Ping"
    );
}

#[test]
fn fmt_inline_expands_local_references() {
    let output = parapet()
        .args(["fmt", "--inline", "--output-format", "json", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    let message = &v["channels"]["ping"]["publish"]["message"];
    assert_eq!(message["name"], "ping");
    assert_eq!(
        message["payload"]["properties"]["sentAt"]["format"],
        "date-time"
    );
}

#[test]
fn fmt_without_resolution_keeps_references() {
    let output = parapet()
        .args(["fmt", "--resolve", "none", "--inline", "--output-format", "json", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(
        v["channels"]["ping"]["publish"]["message"]["$ref"],
        "#/components/messages/Ping"
    );
}

#[test]
fn fmt_rejects_unknown_resolution() {
    parapet()
        .args(["fmt", "--resolve", "everything", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .failure();
}

#[test]
fn fmt_inline_stops_at_recursive_schemas() {
    let output = parapet()
        .args(["fmt", "--inline", "--output-format", "json", "--spec"])
        .arg(fixtures().join("cyclic.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(
        v["channels"]["tree/changed"]["subscribe"]["message"]["payload"]["$ref"],
        "#/components/schemas/Node"
    );
    assert_eq!(
        v["components"]["schemas"]["Node"]["properties"]["children"]["items"]["$ref"],
        "#/components/schemas/Node"
    );
}

#[test]
fn fmt_inline_follows_workspace_documents() {
    let output = parapet()
        .args(["fmt", "--inline", "--output-format", "json", "--spec"])
        .arg(fixtures().join("uses-common.yaml"))
        .arg("--workspace")
        .arg(fixtures().join("common.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    let message = &v["channels"]["heartbeat"]["subscribe"]["message"];
    assert_eq!(message["name"], "heartbeat");
    assert_eq!(message["payload"]["type"], "integer");
}

#[test]
fn fmt_writes_to_output_file() {
    let tmp = TempDir::new().expect("temp dir");
    let out = tmp.path().join("formatted.yaml");

    parapet()
        .args(["fmt", "--spec"])
        .arg(fixtures().join("cyclic.yaml"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout("");

    let written = std::fs::read_to_string(&out).expect("read output");
    assert!(written.starts_with("asyncapi:"));
    assert!(written.contains("tree/changed"));
}

#[test]
fn fmt_dangling_reference_still_writes_and_exits_one() {
    parapet()
        .args(["fmt", "--spec"])
        .arg(fixtures().join("dangling-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .stdout(contains("OrderCancelled"))
        .stderr(contains("OrderPlaced"));
}

#[test]
fn fmt_unknown_output_format_exits_two() {
    parapet()
        .args(["fmt", "--output-format", "toml", "--spec"])
        .arg(fixtures().join("minimal.yaml"))
        .assert()
        .failure()
        .code(2);
}

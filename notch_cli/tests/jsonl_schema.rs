use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_fast_lever_config(dir: &Path) -> PathBuf {
    let path = dir.join("cfg.toml");
    fs::write(&path, "[lever]\nstep_fraction = 0.05\nstep_delay_ms = 0\n").unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad JSON line {l:?}: {e}")))
        .collect()
}

/// Every lever-sim line is an event; the stream opens with `started` and
/// closes with exactly one `finished`.
#[rstest]
#[case("echo", 3)]
#[case("gates", 3)]
#[case("mixed", 3)]
fn lever_sim_event_stream_schema(#[case] profile: &str, #[case] expected_notches: usize) {
    let dir = tempdir().unwrap();
    let cfg = write_fast_lever_config(dir.path());

    let out = Command::cargo_bin("notchctl")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["lever-sim", "--profile", profile])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let events = json_lines(&out);

    assert_eq!(events.first().unwrap()["event"], "started");
    let finished: Vec<_> = events.iter().filter(|e| e["event"] == "finished").collect();
    assert_eq!(finished.len(), 1);
    assert_eq!(events.last().unwrap()["event"], "finished");

    let data = &finished[0]["data"];
    assert_eq!(data["result"], "notches_saved");
    let notches = data["notches"].as_array().unwrap();
    assert_eq!(notches.len(), expected_notches);
    for (i, n) in notches.iter().enumerate() {
        assert_eq!(n["index"].as_u64(), Some(i as u64));
        assert!(matches!(n["type"].as_str(), Some("gate" | "linear")));
    }

    // Progress lines carry the lever session payload
    for e in events.iter().filter(|e| e["event"] == "sample_updated") {
        assert_eq!(e["data"]["session"], "lever");
        assert!(e["data"]["current_value"].as_f64().is_some());
    }
}

#[rstest]
fn analyze_json_schema() {
    let dir = tempdir().unwrap();
    let write = |name: &str, values: Vec<i32>| {
        let p = dir.path().join(name);
        let body: String = std::iter::once("raw".to_string())
            .chain(values.iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&p, body).unwrap();
        p
    };
    // Inverted pot: codes fall from 800 to 220
    let min = write("min.csv", (0..12).map(|i| 800 - i % 4).collect());
    let sweep = write("sweep.csv", (0..30).map(|i| 800 - i * 20).collect());
    let max = write("max.csv", (0..12).map(|i| 220 - i % 4).collect());

    let out = Command::cargo_bin("notchctl")
        .unwrap()
        .args(["--json", "--log-level", "error", "analyze", "--input-id", "7"])
        .arg("--min")
        .arg(&min)
        .arg("--sweep")
        .arg(&sweep)
        .arg("--max")
        .arg(&max)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);
    assert_eq!(lines.len(), 1);
    let v = &lines[0];

    assert_eq!(v["calibration"]["input_id"], 7);
    assert_eq!(v["calibration"]["is_inverted"], true);
    assert_eq!(v["calibration"]["has_rollover"], false);
    assert_eq!(v["analysis"]["inverted"], true);
    let min_value = v["calibration"]["min_value"].as_i64().unwrap();
    let max_value = v["calibration"]["max_value"].as_i64().unwrap();
    assert!(min_value < max_value);
    assert_eq!(v["total_travel"].as_i64(), Some(max_value - min_value));
}

/// Errors under --json are one object on stdout with a stable reason.
#[rstest]
fn error_json_schema() {
    let dir = tempdir().unwrap();
    let p = dir.path().join("short.csv");
    fs::write(&p, "raw\n1\n2\n3\n").unwrap();

    let out = Command::cargo_bin("notchctl")
        .unwrap()
        .args(["--json", "--log-level", "error", "analyze"])
        .arg("--min")
        .arg(&p)
        .arg("--sweep")
        .arg(&p)
        .arg("--max")
        .arg(&p)
        .assert()
        .code(3)
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["reason"], "InsufficientSamples");
    assert_eq!(lines[0]["details"]["needed"], 10);
    assert_eq!(lines[0]["details"]["got"], 3);
    assert!(lines[0]["message"].as_str().unwrap().contains("What happened"));
}

#[rstest]
fn normalize_json_schema() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    // Rollover record: travel wraps past the top code
    fs::write(
        &cfg,
        "[calibration]\nmin_value = 900\nmax_value = 1300\nhas_rollover = true\n",
    )
    .unwrap();

    let out = Command::cargo_bin("notchctl")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["normalize", "--raw", "100"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v = &json_lines(&out)[0];
    assert_eq!(v["raw"], 100);
    assert_eq!(v["total_travel"], 400);
    assert_eq!(v["value"], 224);
    assert!(v["fraction"].as_f64().unwrap() > 0.5);
}

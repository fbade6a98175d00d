//! End-to-end tests for the complete heartbeat flow.
//!
//! Tests the full pipeline: import → alias/label → summary → status

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use chrono::{TimeDelta, Utc};
use tempfile::TempDir;

fn hb_binary() -> String {
    env!("CARGO_BIN_EXE_hb").to_string()
}

/// Writes a config pointing at a database inside `temp`.
fn write_config(temp: &Path) -> PathBuf {
    let path = temp.join("config.toml");
    let db_path = temp.join("data").join("hb.db");
    std::fs::write(
        &path,
        format!(
            "database_path = {:?}\nuser = \"alice\"\nutc_offset_minutes = 0\n",
            db_path.display().to_string()
        ),
    )
    .unwrap();
    path
}

fn hb(temp: &Path, config: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(hb_binary())
        .env("HOME", temp)
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run hb");
    {
        let mut pipe = child.stdin.take().unwrap();
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes()).unwrap();
        }
    }
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "hb {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn a_day_ago() -> i64 {
    (Utc::now() - TimeDelta::days(1)).timestamp()
}

/// Two bursts of three heartbeats, one hour apart, starting at `base`.
fn heartbeats_jsonl(base: i64) -> String {
    let mut lines = Vec::new();
    for (project, offset) in [("wakapi", 0), ("anchr", 3600)] {
        for step in 0..3 {
            lines.push(format!(
                r#"{{"entity": "main.go", "type": "file", "category": "coding", "project": "{project}", "language": "Go", "editor": "goland", "operating_system": "linux", "time": {}}}"#,
                base + offset + step * 30
            ));
        }
    }
    lines.join("\n")
}

fn summary_json(temp: &Path, config: &Path) -> serde_json::Value {
    let output = hb(temp, config, &["summary", "--from", "3 days ago", "--json"], None);
    serde_json::from_str(&stdout(&output)).unwrap()
}

fn keys(summary: &serde_json::Value, dimension: &str) -> Vec<String> {
    let mut keys: Vec<String> = summary[dimension]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["key"].as_str().unwrap().to_string())
        .collect();
    keys.sort();
    keys
}

#[test]
fn test_import_then_summarize() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let input = heartbeats_jsonl(a_day_ago());

    let imported = hb(temp.path(), &config, &["import"], Some(&input));
    assert_eq!(
        stdout(&imported),
        "Imported 6 heartbeats (0 duplicates, 0 rejected)\n"
    );

    let summary = summary_json(temp.path(), &config);
    assert_eq!(summary["user_id"], "alice");
    assert_eq!(summary["num_heartbeats"], 6);
    assert_eq!(keys(&summary, "projects"), ["anchr", "wakapi"]);
    assert_eq!(keys(&summary, "editors"), ["Goland"]);
    assert_eq!(keys(&summary, "operating_systems"), ["Linux"]);
    assert!(summary["entities"].as_array().unwrap().is_empty());

    let reimported = hb(temp.path(), &config, &["import"], Some(&input));
    assert_eq!(
        stdout(&reimported),
        "Imported 0 heartbeats (6 duplicates, 0 rejected)\n"
    );
}

#[test]
fn test_aliases_and_labels_shape_summary() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    hb(temp.path(), &config, &["import"], Some(&heartbeats_jsonl(a_day_ago())));

    hb(temp.path(), &config, &["alias", "add", "project", "tracker", "wakapi"], None);
    hb(temp.path(), &config, &["alias", "add", "project", "tracker", "anchr"], None);
    hb(temp.path(), &config, &["label", "add", "tracker", "oss"], None);

    let summary = summary_json(temp.path(), &config);
    assert_eq!(keys(&summary, "projects"), ["tracker"]);
    assert_eq!(keys(&summary, "labels"), ["oss"]);
    assert_eq!(
        summary["labels"][0]["total_ms"],
        summary["projects"][0]["total_ms"]
    );

    let filtered = hb(
        temp.path(),
        &config,
        &["heartbeats", "--from", "3 days ago", "--label", "oss"],
        None,
    );
    assert!(stdout(&filtered).ends_with("6 heartbeats\n"));
}

#[test]
fn test_status_and_user_override() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    hb(temp.path(), &config, &["import"], Some(&heartbeats_jsonl(a_day_ago())));

    let status = stdout(&hb(temp.path(), &config, &["status"], None));
    assert!(status.contains("User: alice"));
    assert!(status.contains("Heartbeats: 6"));

    let other = stdout(&hb(temp.path(), &config, &["--user", "bob", "status"], None));
    assert!(other.contains("User: bob"));
    assert!(other.contains("No heartbeats recorded."));
}

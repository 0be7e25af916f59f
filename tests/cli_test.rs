//! Binary-level tests: configuration failures and dry runs.
//!
//! Nothing here needs btrfs; dry runs stop after destination selection.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn snapshift_bin() -> String {
    env!("CARGO_BIN_EXE_snapshift").to_string()
}

/// Empty config file so a user config never leaks into the test.
fn empty_config(dir: &TempDir) -> String {
    let path = dir.path().join("config.toml");
    fs::write(&path, "").unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_missing_source_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let config = empty_config(&tmp);
    let missing = tmp.path().join("missing");

    let output = Command::new(snapshift_bin())
        .args([
            "--config",
            &config,
            "--source",
            missing.to_str().unwrap(),
            "--volume",
            tmp.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a directory"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_denylist_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "source_dir = \"{}\"\ndenylist = [\"/mnt/cache\"]\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let output = Command::new(snapshift_bin())
        .args(["--config", config.to_str().unwrap(), "--dry-run"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid denylist entry"), "stderr: {}", stderr);
}

#[test]
fn test_dry_run_json_report() {
    let tmp = TempDir::new().unwrap();
    let config = empty_config(&tmp);
    let source = tmp.path().join("snapshots");
    fs::create_dir(&source).unwrap();
    fs::create_dir(source.join("2024-01-02")).unwrap();
    fs::create_dir(source.join("2024-01-01")).unwrap();
    let volume = tmp.path().join("disk1");
    fs::create_dir(&volume).unwrap();

    let output = Command::new(snapshift_bin())
        .args([
            "--config",
            &config,
            "--source",
            source.to_str().unwrap(),
            "--volume",
            volume.to_str().unwrap(),
            "--dry-run",
            "--json",
            "-q",
        ])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "snapshift failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    let snapshots = report["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0]["snapshot"]["name"], "2024-01-01");
    assert_eq!(snapshots[0]["status"], "planned");
    assert_eq!(
        snapshots[1]["destination"]["mount_path"],
        volume.to_str().unwrap()
    );

    // Nothing moved
    assert!(source.join("2024-01-01").exists());
    assert!(!volume.join(".snapshots").exists());
}

#[test]
fn test_help() {
    let output = Command::new(snapshift_bin()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("--volume"));
}

/// Config denying `denied`, with a permissive denylist pattern.
fn denylist_config(dir: &TempDir, denied: &std::path::Path) -> String {
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        format!(
            "denylist_pattern = \".*\"\ndenylist = [\"{}\"]\n",
            denied.display()
        ),
    )
    .unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_explicit_volume_respects_denylist() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("snapshots");
    fs::create_dir_all(source.join("snap")).unwrap();
    let denied = tmp.path().join("denied");
    let allowed = tmp.path().join("allowed");
    fs::create_dir(&denied).unwrap();
    fs::create_dir(&allowed).unwrap();
    let config = denylist_config(&tmp, &denied);

    // Both live on one filesystem; unfiltered, the first listed volume wins ties
    let output = Command::new(snapshift_bin())
        .args([
            "--config",
            &config,
            "--source",
            source.to_str().unwrap(),
            "--volume",
            denied.to_str().unwrap(),
            "--volume",
            allowed.to_str().unwrap(),
            "--dry-run",
            "--json",
            "-q",
        ])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "snapshift failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let snapshots = report["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        snapshots[0]["destination"]["mount_path"],
        allowed.to_str().unwrap()
    );
}

#[test]
fn test_only_denylisted_volumes_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("snapshots");
    fs::create_dir_all(source.join("snap")).unwrap();
    let denied = tmp.path().join("denied");
    fs::create_dir(&denied).unwrap();
    let config = denylist_config(&tmp, &denied);

    let output = Command::new(snapshift_bin())
        .args([
            "--config",
            &config,
            "--source",
            source.to_str().unwrap(),
            "--volume",
            denied.to_str().unwrap(),
            "--dry-run",
            "--json",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(source.join("snap").exists());
}

//! Smoke tests for the `threatscope` binary.
//!
//! Only commands that never reach a model backend are exercised here.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn threatscope_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("threatscope");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let reports = root.join("reports");
    fs::create_dir_all(&reports).unwrap();
    fs::write(
        reports.join("apt29.txt"),
        "APT29 spear phishing campaign delivering WellMess malware. ".repeat(30),
    )
    .unwrap();
    fs::write(
        reports.join("lockbit.txt"),
        "LockBit affiliates abuse exposed RDP before encrypting shares.",
    )
    .unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[index]
path = "{root}/vectorstore/index.sqlite"

[corpus]
root = "{root}/reports"

[prompts]
dir = "{root}/prompts"

[embedding]
url = "http://127.0.0.1:9"
timeout_secs = 2

[generation]
url = "http://127.0.0.1:9"
models = ["qwen2.5:0.5b", "llama3.2:1b"]
"#,
        root = root.display()
    );

    let config_path = config_dir.join("threatscope.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run(config_path: Option<&Path>, args: &[&str]) -> (String, String, bool) {
    let binary = threatscope_binary();
    let mut cmd = Command::new(&binary);
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    let output = cmd
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run threatscope binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_detect_prints_mode() {
    let (stdout, _, ok) = run(None, &["detect", "Failed password for root from 10.0.0.5"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "IR");

    let (stdout, _, ok) = run(None, &["detect", "APT29 phishing campaign"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "Threat Intel");

    let (stdout, _, ok) = run(None, &["detect", "weekly patch status"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "Hybrid");
}

#[test]
fn test_status_without_index_points_to_build() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run(Some(&config), &["status"]);
    assert!(!ok);
    assert!(stderr.contains("threatscope build"), "stderr: {}", stderr);
}

#[test]
fn test_query_without_index_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run(Some(&config), &["query", "APT29 TTPs", "--mode", "threat-intel"]);
    assert!(!ok);
    assert!(stderr.contains("index not found"), "stderr: {}", stderr);
}

#[test]
fn test_build_dry_run_counts() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run(Some(&config), &["build", "--dry-run"]);
    assert!(ok);
    assert!(stdout.contains("documents: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("estimated chunks: 4"), "stdout: {}", stdout);
}

#[test]
fn test_build_empty_corpus_fails() {
    let (tmp, config) = setup_test_env();
    for entry in fs::read_dir(tmp.path().join("reports")).unwrap() {
        fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let (_, stderr, ok) = run(Some(&config), &["build", "--progress", "off"]);
    assert!(!ok);
    assert!(stderr.contains("no documents found"), "stderr: {}", stderr);
    assert!(!tmp.path().join("vectorstore/index.sqlite").exists());
}

#[test]
fn test_build_with_unreachable_embedder_fails() {
    let (tmp, config) = setup_test_env();
    let (_, stderr, ok) = run(Some(&config), &["build", "--progress", "off"]);
    assert!(!ok);
    assert!(stderr.contains("embedding service unavailable"), "stderr: {}", stderr);
    assert!(!tmp.path().join("vectorstore/index.sqlite").exists());
}

#[test]
fn test_analyze_rejects_unsupported_file() {
    let (tmp, config) = setup_test_env();
    let doc = tmp.path().join("report.docx");
    fs::write(&doc, "binary-ish").unwrap();

    let (_, stderr, ok) = run(Some(&config), &["analyze", doc.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("unsupported file type"), "stderr: {}", stderr);
}

#[test]
fn test_explicit_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, ok) = run(Some(&missing), &["status"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

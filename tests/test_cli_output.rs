//! End-to-end runs of the idlgen binary and the JSON emitter

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use idlgen::emit::{emit, JsonEmitter};
use idlgen::*;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn idlgen() -> Command {
    Command::new(env!("CARGO_BIN_EXE_idlgen"))
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_json_emitter_writes_both_files() {
    let description = InterfaceDescription::load(&fixture("echo.toml")).unwrap();
    let output = driver::generate_description(&description, &Config::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut emitter = JsonEmitter::new(dir.path());
    let written = emit(&output, &mut emitter).unwrap();
    assert_eq!(
        written,
        [dir.path().join("echo.client.json"), dir.path().join("echo.server.json")]
    );

    let client = read_json(&written[0]);
    assert_eq!(client["interface"], "echo");
    assert_eq!(client["backend"], "native-v4");
    assert_eq!(client["functions"].as_array().unwrap().len(), 2);
    assert!(client.get("server_loop").is_none());

    let server = read_json(&written[1]);
    assert_eq!(server["functions"][0]["name"], "echo_Echo_wait_any");
    assert_eq!(server["server_loop"]["default_outcome"], "continue_loop");
}

#[test]
fn test_cli_generates_files() {
    let dir = tempfile::tempdir().unwrap();
    let status = idlgen()
        .arg(fixture("echo.toml"))
        .args(["--backend", "socket", "--harness", "--output"])
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    for name in ["echo.client.json", "echo.server.json", "echo.harness.json"] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
    let server = read_json(&dir.path().join("echo.server.json"));
    assert_eq!(server["backend"], "socket");
}

#[test]
fn test_cli_reports_skipped_operations() {
    let dir = tempfile::tempdir().unwrap();
    let status = idlgen()
        .arg(fixture("pager.toml"))
        .args(["--backend", "socket", "--output"])
        .arg(dir.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));

    // the rest of the interface is still written
    let client = read_json(&dir.path().join("pager.client.json"));
    let names: Vec<&str> = client["functions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["pager_read_call"]);
}

#[test]
fn test_cli_rejects_unknown_backend() {
    let dir = tempfile::tempdir().unwrap();
    let status = idlgen()
        .arg(fixture("echo.toml"))
        .args(["--backend", "carrier-pigeon", "--output"])
        .arg(dir.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
    assert!(!dir.path().join("echo.client.json").exists());
}

#[test]
fn test_cli_config_file_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("idlgen.toml");
    fs::write(&config, "backend = \"native-v2\"\nsort_policy = \"declaration\"\n").unwrap();

    let output = idlgen()
        .arg(fixture("echo.toml"))
        .arg("--config")
        .arg(&config)
        .args(["--check", "--dump", "--output"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("interface echo (native-v2)"));
    assert!(!dir.path().join("echo.client.json").exists());
}

//! Command-line surface of the `lb` binary.

use std::process::Command;

fn lb() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lb"))
}

#[test]
fn test_missing_port_prints_usage() {
    let output = lb().output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr was: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_out_of_range_port_rejected() {
    for port in ["0", "65536", "http"] {
        let output = lb().arg(port).output().unwrap();
        assert!(!output.status.success(), "port {} accepted", port);
    }
}

#[test]
fn test_malformed_backend_rejected() {
    let output = lb().args(["8080", "--backend", "no-port"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_missing_config_file_is_fatal() {
    let output = lb()
        .args(["8080", "--config", "/nonexistent/balancer.toml"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_invalid_config_is_fatal() {
    let path = std::env::temp_dir().join(format!("lb-invalid-{}.toml", std::process::id()));
    std::fs::write(&path, "backends = []\n").unwrap();

    let output = lb()
        .arg("8080")
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    let _ = std::fs::remove_file(&path);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NoBackends"), "stderr was: {}", stderr);
}

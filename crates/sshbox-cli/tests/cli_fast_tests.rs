//! Fast CLI tests using assert_cmd.
//! These test the binary directly without needing a container engine.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join(".sshbox.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_flag() {
    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Disposable SSH-ready test containers"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_subcommand_help() {
    for subcmd in &["create", "destroy", "dockerfile", "status"] {
        Command::cargo_bin("sshbox")
            .unwrap()
            .args([subcmd, "--help"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

#[test]
fn test_unknown_subcommand_fails() {
    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("nonexistent-subcommand")
        .assert()
        .failure();
}

#[test]
fn test_dockerfile_centos() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(
        tmp.path(),
        r#"
[instance]
platform = "centos-7"

[driver]
http_proxy = "http://p:8080"
"#,
    );

    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("dockerfile")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("FROM centos:7\n"))
        .stdout(predicate::str::contains("ENV HTTP_PROXY http://p:8080"))
        .stdout(predicate::str::contains("ssh-keygen -t dsa"));
}

#[test]
fn test_dockerfile_defaults_without_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("dockerfile")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("FROM ubuntu\n"))
        .stdout(predicate::str::contains("apt-get install"));
}

#[test]
fn test_dockerfile_unknown_platform_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(
        tmp.path(),
        r#"
[instance]
platform = "freebsd-14"
"#,
    );

    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("dockerfile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown platform 'freebsd'"));
}

#[test]
fn test_dockerfile_from_template() {
    let tmp = tempfile::tempdir().unwrap();
    let template = tmp.path().join("Dockerfile.erb");
    std::fs::write(&template, "FROM <%= image %>\nRUN echo <%= @username %>\n").unwrap();
    let config = write_config(
        tmp.path(),
        &format!(
            r#"
[instance]
platform = "debian-12"

[driver]
dockerfile = "{}"
username = "tester"
"#,
            template.display()
        ),
    );

    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("dockerfile")
        .assert()
        .success()
        .stdout("FROM debian:12\nRUN echo tester\n");
}

#[test]
fn test_invalid_config_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), "[driver\nimage = ");

    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("dockerfile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_destroy_without_state_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--state")
        .arg(tmp.path().join("state.json"))
        .arg("destroy")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No container to destroy"));
}

#[test]
fn test_status_empty_state() {
    let tmp = tempfile::tempdir().unwrap();
    let state = tmp.path().join("state.json");
    std::fs::write(&state, r#"{"image_id":"sha256:abc"}"#).unwrap();

    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--state")
        .arg(&state)
        .arg("status")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("sha256:abc"))
        .stdout(predicate::str::contains("No container recorded"));
}

#[test]
fn test_corrupt_state_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let state = tmp.path().join("state.json");
    std::fs::write(&state, "not json").unwrap();

    Command::cargo_bin("sshbox")
        .unwrap()
        .arg("--state")
        .arg(&state)
        .arg("status")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read state"));
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_CONDA: &str = r#"#!/bin/sh
echo "$@" >> "$MACSTRAP_TEST_LOG"
if [ "$1" = "env" ] && [ "$2" = "list" ]; then
  echo '{"envs": ["/opt/conda", "/opt/conda/envs/dev-old", "/opt/conda/envs/devtools"]}'
fi
exit 0
"#;

fn config_dir(temp: &TempDir) -> PathBuf {
    let dir = temp.path().join("config/macstrap");
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn macstrap(temp: &TempDir, path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("macstrap").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("HOME", temp.path().join("home"))
        .env("PATH", path)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn install_fake_conda(temp: &TempDir) -> PathBuf {
    let bin = temp.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let conda = bin.join("conda");
    fs::write(&conda, FAKE_CONDA).unwrap();
    fs::set_permissions(&conda, fs::Permissions::from_mode(0o755)).unwrap();
    bin
}

#[test]
fn test_help_output() {
    Command::cargo_bin("macstrap")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bundle"))
        .stdout(predicate::str::contains("update"));
}

#[test]
fn test_version() {
    Command::cargo_bin("macstrap")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("macstrap"));
}

#[test]
fn test_unknown_stage_is_rejected() {
    Command::cargo_bin("macstrap")
        .unwrap()
        .arg("fonts")
        .assert()
        .failure();
}

#[test]
fn test_check_reports_declared_packages() {
    let temp = TempDir::new().unwrap();
    let dir = config_dir(&temp);
    fs::write(
        dir.join("packages.toml"),
        "[formula.fd]\n[formula.ripgrep]\n[cask.iterm2]\nappdir = \"~/Applications\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("environment.yml"),
        "name: ds\nchannels: [conda-forge]\ndependencies: [python=3.12, pandas]\n",
    )
    .unwrap();

    macstrap(&temp, &temp.path().join("bin"))
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("packages.toml (3 entries)"))
        .stdout(predicate::str::contains("No config file"))
        .stdout(predicate::str::contains("2 formula(s)"))
        .stdout(predicate::str::contains("1 cask(s)"))
        .stdout(predicate::str::contains("python, pandas"))
        .stdout(predicate::str::contains("ds (2 dependencies, channels: conda-forge)"));
}

#[test]
fn test_check_fails_on_invalid_manifest() {
    let temp = TempDir::new().unwrap();
    let dir = config_dir(&temp);
    fs::write(dir.join("packages.toml"), "[brew.fd]\n").unwrap();

    macstrap(&temp, &temp.path().join("bin"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse manifest file"));
}

#[test]
fn test_env_without_manager_exits_non_zero() {
    let temp = TempDir::new().unwrap();
    let dir = config_dir(&temp);
    fs::write(dir.join("environment.yml"), "name: dev\n").unwrap();

    macstrap(&temp, &temp.path().join("bin"))
        .arg("env")
        .assert()
        .failure()
        .stderr(predicate::str::contains("conda/mamba is not available"));
}

#[test]
fn test_env_creates_exactly_named_environment() {
    let temp = TempDir::new().unwrap();
    let dir = config_dir(&temp);
    let env_file = dir.join("environment.yml");
    fs::write(&env_file, "name: dev\ndependencies: [python]\n").unwrap();
    let bin = install_fake_conda(&temp);
    let log = temp.path().join("conda.log");

    macstrap(&temp, &bin)
        .env("MACSTRAP_TEST_LOG", &log)
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains("environment dev created"));

    let calls = fs::read_to_string(&log).unwrap();
    assert!(calls.contains(&format!(
        "env create --name dev --file {}",
        env_file.display()
    )));
    assert!(!calls.contains("env update"));
    assert!(calls.contains("clean --all --yes"));
}

#[test]
fn test_env_uses_default_name_when_unnamed() {
    let temp = TempDir::new().unwrap();
    let dir = config_dir(&temp);
    fs::write(dir.join("environment.yml"), "dependencies: [python]\n").unwrap();
    let bin = install_fake_conda(&temp);
    let log = temp.path().join("conda.log");

    macstrap(&temp, &bin)
        .env("MACSTRAP_TEST_LOG", &log)
        .arg("env")
        .assert()
        .success();

    let calls = fs::read_to_string(&log).unwrap();
    assert!(calls.contains(&format!("env create --name {}", macstrap::DEFAULT_ENVIRONMENT)));
}

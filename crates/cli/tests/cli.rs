use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).expect("write config");
    path
}

fn storage_config(storage: &Path) -> String {
    format!("[general]\nstorage_path = {:?}\n", storage.display().to_string())
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("crosspost");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[telegram.sender]"));
    assert!(content.contains("ignore_tag = \"#local\""));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, "# mine\n");

    let mut cmd = cargo_bin_cmd!("crosspost");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine\n");
}

#[test]
fn repo_find_prints_all_known_ids() {
    let dir = TempDir::new().expect("temp dir");
    let storage = dir.path().join("storage.json");
    fs::write(&storage, r#"{"items":[{"vk":"1,2","tg":"9"}]}"#).expect("write storage");
    let config_path = write_config(&dir, &storage_config(&storage));

    let mut cmd = cargo_bin_cmd!("crosspost");
    let output = cmd
        .arg("--config")
        .arg(&config_path)
        .args(["repo", "find", "vk", "2", "--json"])
        .output()
        .expect("run repo find");

    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let ids = value.as_array().expect("array of ids");
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[2]["system_name"], "tg");
    assert_eq!(ids[2]["external_id"], "9");
}

#[test]
fn repo_find_unknown_id_fails() {
    let dir = TempDir::new().expect("temp dir");
    let storage = dir.path().join("storage.json");
    fs::write(&storage, r#"{"items":[{"vk":"1"}]}"#).expect("write storage");
    let config_path = write_config(&dir, &storage_config(&storage));

    let mut cmd = cargo_bin_cmd!("crosspost");
    cmd.arg("--config")
        .arg(&config_path)
        .args(["repo", "find", "tg", "404"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No record found for tg:404"));
}

#[test]
fn sync_dry_run_without_channels_completes() {
    let dir = TempDir::new().expect("temp dir");
    let storage = dir.path().join("storage.json");
    let config_path = write_config(&dir, &storage_config(&storage));

    let mut cmd = cargo_bin_cmd!("crosspost");
    cmd.arg("--config")
        .arg(&config_path)
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Pass complete: retrieved 0"));

    assert!(!storage.exists());
}

#[test]
fn sync_fails_when_enabled_channel_has_no_token() {
    let dir = TempDir::new().expect("temp dir");
    let storage = dir.path().join("storage.json");
    let body = format!(
        "{}\n[telegram.sender]\nenabled = true\nchat_id = \"@news\"\ntoken_env = \"XPOST_TEST_MISSING_TOKEN\"\n",
        storage_config(&storage)
    );
    let config_path = write_config(&dir, &body);

    let mut cmd = cargo_bin_cmd!("crosspost");
    cmd.env_remove("XPOST_TEST_MISSING_TOKEN")
        .arg("--config")
        .arg(&config_path)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("XPOST_TEST_MISSING_TOKEN"));
}

//! CLI end-to-end tests
//!
//! Tests for the carfault command-line interface.

use assert_cmd::prelude::*;
use carfault_db::pool::{get_conn, init_pool};
use carfault_db::queries::{dictionary, entries};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the carfault binary
#[allow(deprecated)]
fn carfault_cmd() -> Command {
    Command::cargo_bin("carfault").unwrap()
}

/// Write a config keeping all data below `dir` and return its path.
fn write_config(dir: &Path, name: &str) -> PathBuf {
    let data_dir = dir.join(format!("{}-data", name));
    let config_file = dir.join(format!("{}.toml", name));
    fs::write(
        &config_file,
        format!(
            "[storage]\ndata_dir = {:?}\n\n[backup]\nchunk_size = 1024\n",
            data_dir.to_string_lossy()
        ),
    )
    .unwrap();
    config_file
}

fn run(config: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    carfault_cmd()
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .assert()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = carfault_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = carfault_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("carfault"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = carfault_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("carfault"));
}

#[test]
fn test_cli_merge_help() {
    let mut cmd = carfault_cmd();
    cmd.args(["merge", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merge an exported folder"));
}

#[test]
fn test_cli_search_help() {
    let mut cmd = carfault_cmd();
    cmd.args(["entry", "search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Search titles and descriptions"));
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path(), "valid");

    let mut cmd = carfault_cmd();
    cmd.args(["validate", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Chunk size: 1024"));
}

#[test]
fn test_cli_validate_rejects_zero_chunk_size() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("bad.toml");
    fs::write(&config, "[backup]\nchunk_size = 0\n").unwrap();

    let mut cmd = carfault_cmd();
    cmd.args(["validate", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk_size"));
}

#[test]
fn test_cli_entry_lifecycle() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path(), "store");
    let image = temp.path().join("leak.jpg");
    fs::write(&image, b"jpeg").unwrap();

    let output = run(
        &config,
        &[
            "entry",
            "add",
            "--title",
            "Coolant leak",
            "--brand",
            "Toyota",
            "--year",
            "2018",
            "--model",
            "Camry",
            "--image",
            image.to_str().unwrap(),
        ],
    )
    .success()
    .get_output()
    .stdout
    .clone();
    let id = String::from_utf8(output).unwrap().trim().to_string();

    run(&config, &["entry", "list"])
        .success()
        .stdout(predicate::str::contains("Coolant leak"))
        .stdout(predicate::str::contains("Toyota Camry 2018"));

    run(&config, &["entry", "show", id.as_str()])
        .success()
        .stdout(predicate::str::contains("Images: 1"));

    run(&config, &["entry", "search", "coolant"])
        .success()
        .stdout(predicate::str::contains(id.as_str()));

    run(&config, &["entry", "delete", id.as_str()]).success();
    run(&config, &["entry", "show", id.as_str()])
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_cli_model_needs_brand_and_year() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path(), "store");

    run(
        &config,
        &[
            "entry",
            "add",
            "--title",
            "x",
            "--brand",
            "Toyota",
            "--location",
            "Engine",
            "--model",
            "Camry",
        ],
    )
    .failure()
    .stderr(predicate::str::contains("--model needs"));

    // Nothing was written before the flags were rejected
    let db_path = temp.path().join("store-data").join("carfault.db");
    let pool = init_pool(db_path.to_str().unwrap()).unwrap();
    let conn = get_conn(&pool).unwrap();
    assert!(dictionary::list_brands(&conn).unwrap().is_empty());
    assert!(dictionary::list_locations(&conn).unwrap().is_empty());
    assert_eq!(entries::count_entries(&conn).unwrap(), 0);
}

#[test]
fn test_cli_export_then_merge() {
    let temp = tempdir().unwrap();
    let source = write_config(temp.path(), "source");
    let target = write_config(temp.path(), "target");
    let bundle = temp.path().join("bundle");
    let image = temp.path().join("a.jpg");
    fs::write(&image, b"jpeg").unwrap();

    run(
        &source,
        &[
            "entry",
            "add",
            "--title",
            "Brake squeal",
            "--brand",
            "Honda",
            "--year",
            "2020",
            "--model",
            "Civic",
            "--location",
            "Front left",
            "--image",
            image.to_str().unwrap(),
        ],
    )
    .success();

    run(&source, &["export", bundle.to_str().unwrap()])
        .success()
        .stdout(predicate::str::contains("Exported 1 entries and 1 images"));
    assert!(bundle.join("carfault_export.json").exists());

    run(&target, &["merge", bundle.to_str().unwrap()])
        .success()
        .stdout(predicate::str::contains("Merged 1 entries"));
    run(
        &target,
        &["merge", bundle.to_str().unwrap(), "--strategy", "by_content_hash"],
    )
    .success()
    .stdout(predicate::str::contains("Merged 0 entries"));

    run(&target, &["entry", "list"])
        .success()
        .stdout(predicate::str::contains("Brake squeal").count(1));
}

#[test]
fn test_cli_import() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path(), "store");
    let document = temp.path().join("carfault_export.json");
    fs::write(
        &document,
        r#"{"entries": [{"id": 7, "timestamp": 1700000000, "title": "Old entry", "images": []}]}"#,
    )
    .unwrap();

    run(&config, &["import", document.to_str().unwrap()])
        .success()
        .stdout(predicate::str::contains("Imported 1 entries"));
    run(&config, &["entry", "show", "7"])
        .success()
        .stdout(predicate::str::contains("Old entry"));
}

#[test]
fn test_cli_merge_missing_folder_fails() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path(), "store");

    run(&config, &["merge", temp.path().join("nope").to_str().unwrap()]).failure();
}

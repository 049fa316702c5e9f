//! Integration tests for the narrate CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a narrate Command with a clean model environment
fn narrate() -> Command {
    let mut cmd = cargo_bin_cmd!("narrate");
    cmd.env_remove("NARRATE_ENDPOINT")
        .env_remove("NARRATE_MODEL")
        .env_remove("OLLAMA_HOST")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_narrate_help() {
        narrate()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("watch"))
            .stdout(predicate::str::contains("config"));
    }

    #[test]
    fn test_narrate_version() {
        narrate()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("narrate"));
    }

    #[test]
    fn test_watch_help_lists_tracking_flags() {
        narrate()
            .args(["watch", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--reset-threshold"))
            .stdout(predicate::str::contains("--cache-size"))
            .stdout(predicate::str::contains("--pattern"));
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let dir = create_temp_project();
        narrate()
            .arg("watch")
            .arg(dir.path().join("does-not-exist"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to resolve watch directory"));
    }

    #[test]
    fn test_watch_rejects_unknown_mode() {
        let dir = create_temp_project();
        narrate()
            .arg("watch")
            .arg(dir.path())
            .args(["--mode", "telepathy"])
            .assert()
            .failure();
    }

    #[test]
    fn test_watch_rejects_bad_endpoint() {
        let dir = create_temp_project();
        narrate()
            .arg("watch")
            .arg(dir.path())
            .args(["--endpoint", "ftp://models"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid model endpoint"));
    }
}

// =============================================================================
// Config Command Tests
// =============================================================================

mod config_command {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();

        narrate()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created narrate.toml"));

        let content = fs::read_to_string(dir.path().join(".narrate/narrate.toml")).unwrap();
        assert!(content.contains("[model]"));
        assert!(content.contains("[tracking]"));
        assert!(content.contains("reset_threshold = 100"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".narrate")).unwrap();
        fs::write(
            dir.path().join(".narrate/narrate.toml"),
            "[model]\nname = \"mine\"\n",
        )
        .unwrap();

        narrate()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join(".narrate/narrate.toml")).unwrap();
        assert_eq!(content, "[model]\nname = \"mine\"\n");
    }

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        narrate()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No narrate.toml found"))
            .stdout(predicate::str::contains("http://localhost:11434"))
            .stdout(predicate::str::contains("mode = \"cache\", diff = \"lcs\""));
    }

    #[test]
    fn test_config_show_reflects_file_and_env() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".narrate")).unwrap();
        fs::write(
            dir.path().join(".narrate/narrate.toml"),
            "[tracking]\nmode = \"snapshot\"\n",
        )
        .unwrap();

        narrate()
            .args(["config", "show", "--dir"])
            .arg(dir.path())
            .env("NARRATE_MODEL", "codellama")
            .assert()
            .success()
            .stdout(predicate::str::contains("model = \"codellama\""))
            .stdout(predicate::str::contains("mode = \"snapshot\", diff = \"positional\""));
    }

    #[test]
    fn test_config_validate_without_file() {
        let dir = create_temp_project();

        narrate()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".narrate")).unwrap();
        fs::write(
            dir.path().join(".narrate/narrate.toml"),
            "[tracking]\ncache_size = 0\n\n[watch]\npatterns = [\"[\"]\n",
        )
        .unwrap();

        narrate()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("cache_size is 0"))
            .stdout(predicate::str::contains("Invalid glob"));
    }

    #[test]
    fn test_config_rejects_malformed_toml() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".narrate")).unwrap();
        fs::write(dir.path().join(".narrate/narrate.toml"), "[model\n").unwrap();

        narrate()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse narrate.toml"));
    }
}

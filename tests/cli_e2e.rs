//! End-to-end CLI tests for xprofiles.
//!
//! These tests run the actual binary and verify:
//! - Help, version and completions output
//! - Config inspection and "did you mean" hints
//! - Offline commands (`convert`) and early `run` failures
//!
//! Nothing here touches the network: every `run` invocation fails during
//! startup validation, before a session is requested.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Log a test event with timestamp
macro_rules! test_log {
    ($($arg:tt)*) => {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f");
        eprintln!("[TEST {}] {}", timestamp, format!($($arg)*));
    };
}

const ENV_VARS: &[&str] = &[
    "XPROFILES_CONFIG",
    "XPROFILES_HANDLES",
    "XPROFILES_COOKIES",
    "XPROFILES_OUTPUT_DIR",
    "XPROFILES_TWEET_LIMIT",
    "XPROFILES_HIGHLIGHT_LIMIT",
    "XPROFILES_MAX_ATTEMPTS",
    "XPROFILES_BASE_DELAY",
    "XPROFILES_API_URL",
    "AUTH_INFO_1",
    "AUTH_INFO_2",
    "PASSWORD",
    "RUST_LOG",
];

/// A command isolated from the caller's environment and config files.
fn xprofiles_cmd(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("xprofiles");
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("NO_COLOR", "1");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

const SAMPLE_OUTPUT: &str = r#"{
    "users": [
        {"id": "1", "name": "Alice", "screen_name": "alice", "urls": ["https://a.example"]}
    ],
    "tweets": [
        {"tweet_id": "10", "user_id": "1", "text": "hello, \"world\""},
        {"tweet_id": "11", "user_id": "1", "text": "second"}
    ],
    "highlight_tweets": []
}"#;

// =============================================================================
// General CLI
// =============================================================================

#[test]
fn test_cli_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_completions_bash() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xprofiles"));
}

#[test]
fn test_cli_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path()).arg("scrape").assert().failure();
}

// =============================================================================
// config
// =============================================================================

#[test]
fn test_config_default_prints_every_section() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .args(["config", "--default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[retry]"))
        .stdout(predicate::str::contains("max_attempts = 5"))
        .stdout(predicate::str::contains("[delay]"))
        .stdout(predicate::str::contains("usernames.txt"));
}

#[test]
fn test_config_get_reads_file_value() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "[retry]\nmax_attempts = 9\n");
    xprofiles_cmd(dir.path())
        .args(["config", "--get", "retry.max_attempts", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout("9\n");
}

#[test]
fn test_config_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "[fetch]\ntweet_limit = 50\n");
    xprofiles_cmd(dir.path())
        .env("XPROFILES_TWEET_LIMIT", "75")
        .args(["config", "--get", "fetch.tweet_limit", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout("75\n");
}

#[test]
fn test_config_show_masks_password() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .env("PASSWORD", "hunter2")
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_without_flags_points_at_show() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "[retry]\nmax_attempts = 4\n");
    xprofiles_cmd(dir.path())
        .args(["config", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("config --show"))
        .stdout(predicate::str::contains("[retry]").not());
}

#[test]
fn test_config_show_prints_effective_toml() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "[retry]\nmax_attempts = 4\n");
    xprofiles_cmd(dir.path())
        .args(["config", "--show", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[retry]"))
        .stdout(predicate::str::contains("max_attempts = 4"));
}

#[test]
fn test_config_unknown_key_suggests_closest() {
    test_log!("checking did-you-mean for a misspelled key");
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .args(["config", "--get", "retry.max_atempts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"))
        .stderr(predicate::str::contains("Did you mean"))
        .stderr(predicate::str::contains("retry.max_attempts"));
}

#[test]
fn test_config_invalid_toml_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "[retry\nmax_attempts = ");
    xprofiles_cmd(dir.path())
        .args(["config", "--show", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

// =============================================================================
// convert
// =============================================================================

#[test]
fn test_convert_writes_csvs_next_to_json() {
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("twitter_profiles_data.json");
    fs::write(&json, SAMPLE_OUTPUT).unwrap();

    xprofiles_cmd(dir.path())
        .args(["convert"])
        .arg(&json)
        .assert()
        .success();

    let users = fs::read_to_string(dir.path().join("users.csv")).unwrap();
    assert!(users.starts_with("\"id\",\"name\",\"screen_name\""));
    assert!(users.contains(r#""[""https://a.example""]""#));

    let tweets = fs::read_to_string(dir.path().join("tweets.csv")).unwrap();
    assert_eq!(tweets.lines().count(), 3);
    assert!(tweets.contains(r#""hello, ""world""""#));

    let highlights = fs::read_to_string(dir.path().join("highlight_tweets.csv")).unwrap();
    assert_eq!(highlights.lines().count(), 1);
}

#[test]
fn test_convert_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .args(["convert", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_missing_handle_list_fails_fast() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .args(["run", "--no-delay", "--output-dir", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("usernames.txt"));

    assert!(!dir.path().join("out").join("twitter_profiles_data.json").exists());
}

#[test]
fn test_run_empty_handle_list_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("usernames.txt"), "\n# nobody yet\n").unwrap();
    xprofiles_cmd(dir.path())
        .args(["run", "--output-dir", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("contains no handles"));
}

#[test]
fn test_run_without_session_or_credentials_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("usernames.txt"), "alice\n").unwrap();
    xprofiles_cmd(dir.path())
        .args(["run", "--output-dir", "out", "--api-url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no credentials configured"));
}

#[test]
fn test_run_rejects_zero_attempts() {
    let dir = TempDir::new().unwrap();
    xprofiles_cmd(dir.path())
        .args(["run", "--max-attempts", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_attempts"));
}

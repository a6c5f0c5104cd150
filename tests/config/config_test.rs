//! Coverage for config parsing, file loading and env precedence.

use std::path::PathBuf;
use std::time::Duration;

use guardian::config::{config_dir, GuardianConfig};

#[test]
fn config_dir_resolves() {
    let dir = config_dir();
    assert!(dir.is_ok());
    let path = match dir {
        Ok(path) => path,
        Err(err) => panic!("config dir should resolve: {err}"),
    };
    assert!(path.ends_with(".guardian"));
}

#[test]
fn parse_full_config() {
    let toml_str = r#"
enabled = true
log_level = "debug"
allowlist = ["command_exec"]

[paths]
journal = "/var/log/guardian/journal.jsonl"
last_resort = "/tmp/fallback.jsonl"
executive_dir = "/opt/executive"

[budget]
max_duration_ms = 1500

[command]
timeout_secs = 10
output_limit = 80

[http]
timeout_secs = 5
"#;
    let config = GuardianConfig::from_toml(toml_str).expect("should parse");
    assert!(config.enabled);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.allowlist, vec!["command_exec".to_owned()]);
    assert_eq!(
        config.paths.executive_dir,
        Some(PathBuf::from("/opt/executive"))
    );
    assert_eq!(config.budget_limit(), Some(Duration::from_millis(1500)));
    assert_eq!(config.command.timeout_secs, 10);
    assert_eq!(config.command.output_limit, 80);
    assert_eq!(config.http.timeout_secs, 5);
}

#[test]
fn partial_config_keeps_defaults() {
    let config = GuardianConfig::from_toml("enabled = true\n").expect("should parse");
    assert!(config.enabled);
    assert_eq!(config.allowlist.len(), 5);
    assert_eq!(config.command.output_limit, 500);
    assert_eq!(config.http.timeout_secs, 30);
}

#[test]
fn malformed_toml_is_an_error() {
    assert!(GuardianConfig::from_toml("enabled = [").is_err());
}

#[test]
fn missing_file_yields_defaults() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let config =
        GuardianConfig::load_from_file(&tmp.path().join("absent.toml")).expect("defaults");
    assert!(!config.enabled);
}

#[test]
fn file_then_env_precedence() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "enabled = true\nlog_level = \"warn\"\n").expect("write config");

    let mut config = GuardianConfig::load_from_file(&path).expect("load");
    assert!(config.enabled);

    config.apply_overrides(|key| match key {
        "EXEC_HOOK_ENABLED" => Some("off".to_owned()),
        "GUARDIAN_LOG_LEVEL" => Some("trace".to_owned()),
        "GUARDIAN_LAST_RESORT_PATH" => Some("/env/fallback.jsonl".to_owned()),
        "GUARDIAN_EXECUTIVE_DIR" => Some("/env/executive".to_owned()),
        "GUARDIAN_BUDGET_MS" => Some("0".to_owned()),
        _ => None,
    });
    assert!(!config.enabled);
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.paths.last_resort, PathBuf::from("/env/fallback.jsonl"));
    assert_eq!(
        config.paths.executive_dir,
        Some(PathBuf::from("/env/executive"))
    );
    assert!(config.budget_limit().is_none());
}

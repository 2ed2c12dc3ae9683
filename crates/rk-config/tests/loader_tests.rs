//! Configuration loader tests

use std::collections::HashMap;
use std::io::Write;

use rk_config::{ConfigError, ConfigLoader, GroupConfig};

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_load_from_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[service]
server_url = "https://api.example.test"
app_id = "app"

[[groups]]
index = 0
name = "Core"

[[groups]]
index = 1
name = "Ops"
"#
    )
    .unwrap();

    let config = ConfigLoader::with_path(file.path())
        .load_with(|_| None)
        .unwrap();

    assert_eq!(config.service.server_url, "https://api.example.test");
    assert_eq!(config.service.app_id, "app");
    assert_eq!(config.groups.len(), 2);
    assert_eq!(config.groups[1], GroupConfig::new(1, "Ops"));
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[procedures]\nmax_attempts = 3\nretry_delay_ms = 10").unwrap();

    let env = vars(&[
        ("ROSTERKIT_PROCEDURE_MAX_ATTEMPTS", "7"),
        ("ROSTERKIT_GROUPS", "Core, Ops ,Design"),
        ("ROSTERKIT_APP_KEY", "secret"),
    ]);

    let config = ConfigLoader::with_path(file.path())
        .load_with(|key| env.get(key).cloned())
        .unwrap();

    assert_eq!(config.procedures.max_attempts, 7);
    assert_eq!(config.procedures.retry_delay_ms, 10);
    assert_eq!(config.service.app_key, "secret");
    assert_eq!(
        config.groups,
        GroupConfig::from_names(["Core", "Ops", "Design"])
    );
}

#[test]
fn test_config_path_from_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[service]\ntimeout_ms = 1234").unwrap();
    let path = file.path().to_string_lossy().to_string();
    let env = vars(&[("ROSTERKIT_CONFIG", &path)]);

    let config = ConfigLoader::new()
        .load_with(|key| env.get(key).cloned())
        .unwrap();

    assert_eq!(config.service.timeout_ms, 1234);
}

#[test]
fn test_invalid_file_fails_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[groups]]\nindex = 1\nname = \"Ops\"").unwrap();

    let result = ConfigLoader::with_path(file.path()).load_with(|_| None);

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[service\nserver_url = ").unwrap();

    let result = ConfigLoader::with_path(file.path()).load_with(|_| None);

    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

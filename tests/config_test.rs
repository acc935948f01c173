//! Configuration loading tests

use slotcast::config::Config;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_full_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[source]
base_url = "https://ads.example.com/v2"
screen_id = "lobby-2"
request_timeout_secs = 10

[scheduler]
lookahead_slots = 30

[retry]
expired_cooldown_secs = 90
failure_cooldown_secs = 15
max_attempts = 5

[cache]
capacity = 64
wait_timeout_ms = 250
max_concurrent_decodes = 2

[storage]
data_dir = "/var/lib/slotcast"

[logging]
level = "debug"
format = "json"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.source.base_url, "https://ads.example.com/v2");
    assert_eq!(config.source.screen_id, "lobby-2");
    assert_eq!(config.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.scheduler.lookahead_slots, 30);
    assert_eq!(config.storage.data_dir, Path::new("/var/lib/slotcast"));
    assert_eq!(config.logging.format, "json");

    let policy = config.retry_policy();
    assert_eq!(policy.expired_cooldown, Duration::from_secs(90));
    assert_eq!(policy.failure_cooldown, Duration::from_secs(15));
    assert_eq!(policy.max_attempts, Some(5));

    let cache = config.cache_config();
    assert_eq!(cache.capacity, 64);
    assert_eq!(cache.wait_timeout, Duration::from_millis(250));
    assert_eq!(cache.max_concurrent_decodes, 2);
}

#[test]
fn test_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
    let config = Config::from_file(&path).unwrap();
    config.validate().unwrap();
}

#[test]
fn test_missing_file_is_error() {
    let err = Config::from_file(Path::new("/nonexistent/slotcast.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_invalid_values_fail_validation() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[scheduler]
lookahead_slots = 0
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_toml_is_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[cache\ncapacity = ").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

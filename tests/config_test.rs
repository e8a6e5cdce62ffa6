//! Integration tests for configuration loading

use coolchain_validator::infra::Config;
use coolchain_validator::services::Thresholds;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[thresholds]
max_gap_minutes = 15
max_hours = 36

[source]
path = "data/coolchain.jsonl"

[report]
enabled = false
file = "out/reports.jsonl"

[batch]
max_concurrency = 2
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.thresholds(), Thresholds::new(15, 36));
    assert_eq!(config.source_path(), "data/coolchain.jsonl");
    assert!(!config.report_enabled());
    assert_eq!(config.report_file(), "out/reports.jsonl");
    assert_eq!(config.max_concurrency(), 2);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.thresholds(), Thresholds::default());
    assert_eq!(config.source_path(), "records.jsonl");
}

#[test]
fn test_invalid_toml_is_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[thresholds\nmax_hours = ").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.max_gap_minutes(), 10);
    assert_eq!(config.max_hours(), 48);
    assert_eq!(config.config_file(), "default");
}

use dataset_loader::load_config::{load_config, FileConfig};
use serial_test::serial;
use std::fs::write;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn test_load_config_reads_every_key() {
    let file = config_file(
        r#"
base_url: https://dataverse.example.edu
dataverse_alias: soil-samples
timeout_secs: 120
pause_ms: 250
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(
        config,
        FileConfig {
            base_url: Some("https://dataverse.example.edu".into()),
            dataverse_alias: Some("soil-samples".into()),
            timeout_secs: Some(120),
            pause_ms: Some(250),
        }
    );
}

#[test]
#[serial]
fn test_partial_and_empty_files_leave_defaults() {
    let partial = load_config(config_file("dataverse_alias: only-this\n").path()).unwrap();
    assert_eq!(partial.dataverse_alias.as_deref(), Some("only-this"));
    assert_eq!(partial.base_url, None);

    let empty = load_config(config_file("").path()).unwrap();
    assert_eq!(empty, FileConfig::default());
}

#[test]
#[serial]
fn test_unknown_keys_and_missing_files_are_errors() {
    let err = load_config(config_file("api_token: should-not-live-here\n").path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));

    let err = load_config("/definitely/not/a/config.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

//! Coverage for config parsing, env overrides and validation.

use std::path::{Path, PathBuf};

use straylight::config::{
    load_config, load_effective_with, logs_dir, BookingConfig, Config, RejectedOverride,
    ServerConfig,
};

fn no_env(_: &str) -> Option<String> {
    None
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    if let Err(err) = std::fs::write(&path, contents) {
        panic!("config should be written: {err}");
    }
    path
}

#[test]
fn default_server_and_booking_values() {
    assert_eq!(ServerConfig::default().bind, "127.0.0.1:5000");
    let booking = BookingConfig::default();
    assert_eq!(booking.default_cabin, "economy");
    assert_eq!(
        booking.cabin_classes,
        vec!["economy", "premium economy", "business", "first"]
    );
}

#[test]
fn parse_empty_config_uses_defaults() {
    let parsed = toml::from_str::<Config>("");
    let config = match parsed {
        Ok(config) => config,
        Err(err) => panic!("empty config should parse: {err}"),
    };
    assert_eq!(config.model.default, "ollama/mistral");
    assert_eq!(config.model.timeout_secs, 120);
    assert_eq!(config.logging.level, "info");
    assert!(!config.model.json_format);
    assert!(config.logging.dir.is_none());
}

#[test]
fn parse_partial_config() {
    let toml_str = r#"
[model]
default = "ollama/llama3"
temperature = 0.0
max_tokens = 512
json_format = true

[booking]
cabin_classes = ["economy", "business"]
default_cabin = "business"
"#;
    let config = match toml::from_str::<Config>(toml_str) {
        Ok(config) => config,
        Err(err) => panic!("partial config should parse: {err}"),
    };
    assert_eq!(config.model.default, "ollama/llama3");
    assert_eq!(config.model.temperature, Some(0.0));
    assert_eq!(config.model.max_tokens, Some(512));
    assert!(config.model.json_format);
    assert_eq!(config.booking.default_cabin, "business");
    assert_eq!(config.server.bind, "127.0.0.1:5000");
    assert!(config.validate().is_ok());
}

#[test]
fn env_overrides_beat_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_config(
        tmp.path(),
        "[server]\nbind = \"0.0.0.0:8080\"\n\n[model]\ntimeout_secs = 30\n",
    );

    let config = load_effective_with(Some(&path), |key| match key {
        "STRAYLIGHT_MODEL" => Some("ollama/phi3".to_owned()),
        "STRAYLIGHT_COMPLETER_TIMEOUT_SECS" => Some("45".to_owned()),
        _ => None,
    })
    .expect("config should load")
    .config;

    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.model.default, "ollama/phi3");
    assert_eq!(config.model.timeout_secs, 45);
}

#[test]
fn invalid_timeout_override_is_reported_and_ignored() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let absent = tmp.path().join("absent.toml").display().to_string();

    let loaded = load_effective_with(None, |key| match key {
        "STRAYLIGHT_CONFIG" => Some(absent.clone()),
        "STRAYLIGHT_COMPLETER_TIMEOUT_SECS" => Some("two minutes".to_owned()),
        _ => None,
    })
    .expect("config should load");

    assert_eq!(loaded.config.model.timeout_secs, 120);
    assert_eq!(
        loaded.rejected,
        vec![RejectedOverride {
            var: "STRAYLIGHT_COMPLETER_TIMEOUT_SECS",
            value: "two minutes".to_owned(),
        }]
    );
    assert!(loaded.source.is_none());
}

#[test]
fn file_source_is_recorded() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_config(tmp.path(), "");
    let loaded = load_effective_with(Some(&path), no_env).expect("config should load");
    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    assert!(loaded.rejected.is_empty());
}

#[test]
fn config_env_var_selects_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_config(tmp.path(), "[logging]\nlevel = \"debug\"\n");
    let path_str = path.display().to_string();

    let config = load_effective_with(None, |key| {
        (key == "STRAYLIGHT_CONFIG").then(|| path_str.clone())
    })
    .expect("config should load")
    .config;
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn missing_config_env_file_falls_back_to_defaults() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path_str = tmp.path().join("absent.toml").display().to_string();

    let config = load_effective_with(None, |key| {
        (key == "STRAYLIGHT_CONFIG").then(|| path_str.clone())
    })
    .expect("defaults should load")
    .config;
    assert_eq!(config.model.default, "ollama/mistral");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("absent.toml");
    assert!(load_effective_with(Some(&path), no_env).is_err());
    assert!(load_config(&path).is_err());
}

#[test]
fn unknown_default_cabin_fails_validation() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_config(tmp.path(), "[booking]\ndefault_cabin = \"steerage\"\n");
    let err = load_effective_with(Some(&path), no_env).expect_err("should fail");
    assert!(err.to_string().contains("steerage"));
}

#[test]
fn unsupported_provider_fails_validation() {
    let mut config = Config::default();
    let rejected =
        config.apply_overrides(|key| (key == "STRAYLIGHT_MODEL").then(|| "openai/gpt-4o".to_owned()));
    assert!(rejected.is_empty());
    let err = config.validate().expect_err("should fail");
    assert!(err.to_string().contains("unsupported provider 'openai'"));
}

#[test]
fn zero_timeout_fails_validation() {
    let mut config = Config::default();
    config.model.timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn bad_bind_fails_validation() {
    let mut config = Config::default();
    config.server.bind = "localhost".to_owned();
    assert!(config.validate().is_err());
    assert!(config.bind_addr().is_err());
}

#[test]
fn logs_dir_prefers_configured_dir() {
    let mut config = Config::default();
    config.logging.dir = Some(PathBuf::from("/var/log/straylight"));
    let dir = logs_dir(&config).expect("should resolve");
    assert_eq!(dir, PathBuf::from("/var/log/straylight"));

    config.logging.dir = None;
    let dir = logs_dir(&config).expect("should resolve");
    assert!(dir.ends_with(".straylight/logs"));
}

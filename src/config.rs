//! Configuration loading and validation.
//!
//! Loads `config.toml` from `--config`, `$STRAYLIGHT_CONFIG`, or
//! `~/.straylight/config.toml`. A missing file yields defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::providers::ollama::DEFAULT_OLLAMA_URL;
use crate::providers::parse_provider_string;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Completer model settings.
    pub model: ModelConfig,
    /// Booking normalisation settings.
    pub booking: BookingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Completer model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider spec (e.g. "ollama/mistral").
    pub default: String,
    /// Provider API base URL.
    pub base_url: String,
    /// Hard deadline for one completer call, in seconds.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Ask the backend for JSON-constrained output.
    pub json_format: bool,
}

impl ModelConfig {
    /// Completer deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_tokens: None,
            json_format: false,
        }
    }
}

/// Booking normalisation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Accepted cabin classes, lowercase.
    pub cabin_classes: Vec<String>,
    /// Cabin used when the model gives none or an unknown one.
    pub default_cabin: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            cabin_classes: default_cabin_classes(),
            default_cabin: default_cabin(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

// Default value functions for serde

fn default_bind() -> String {
    "127.0.0.1:5000".to_owned()
}
fn default_model() -> String {
    "ollama/mistral".to_owned()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_cabin_classes() -> Vec<String> {
    ["economy", "premium economy", "business", "first"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}
fn default_cabin() -> String {
    "economy".to_owned()
}
fn default_log_level() -> String {
    "info".to_owned()
}

impl Config {
    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process environment.
    /// Values that cannot be parsed leave the setting alone and are returned
    /// so the caller can report them once logging is up.
    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Vec<RejectedOverride> {
        let mut rejected = Vec::new();
        if let Some(v) = env("STRAYLIGHT_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env("STRAYLIGHT_MODEL") {
            self.model.default = v;
        }
        if let Some(v) = env("STRAYLIGHT_OLLAMA_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = env("STRAYLIGHT_COMPLETER_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(n) => self.model.timeout_secs = n,
                Err(_) => rejected.push(RejectedOverride {
                    var: "STRAYLIGHT_COMPLETER_TIMEOUT_SECS",
                    value: v,
                }),
            }
        }
        if let Some(v) = env("STRAYLIGHT_LOG_LEVEL") {
            self.logging.level = v;
        }
        rejected
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.bind_addr()?;

        let (provider, _) = parse_provider_string(&self.model.default)?;
        if provider != "ollama" {
            anyhow::bail!(
                "unsupported provider '{provider}' in model.default, only 'ollama' is available"
            );
        }
        if self.model.timeout_secs == 0 {
            anyhow::bail!("model.timeout_secs must be greater than zero");
        }
        if !self
            .booking
            .cabin_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&self.booking.default_cabin))
        {
            anyhow::bail!(
                "booking.default_cabin '{}' is not one of booking.cabin_classes",
                self.booking.default_cabin
            );
        }
        Ok(())
    }

    /// Parsed server bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("invalid server.bind '{}'", self.server.bind))
    }
}

/// An environment override that was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    /// Variable name.
    pub var: &'static str,
    /// Value as found in the environment.
    pub value: String,
}

/// The effective configuration and how it was arrived at.
///
/// Loading happens before any subscriber exists, so the notes are kept
/// here and logged by [`LoadedConfig::report`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Validated configuration.
    pub config: Config,
    /// File that was read; `None` when defaults were used.
    pub source: Option<PathBuf>,
    /// Env overrides that could not be applied.
    pub rejected: Vec<RejectedOverride>,
}

impl LoadedConfig {
    /// Log where the config came from and every rejected override.
    pub fn report(&self) {
        match &self.source {
            Some(path) => tracing::info!(path = %path.display(), "loaded config from file"),
            None => tracing::info!("no config file found, using defaults"),
        }
        for r in &self.rejected {
            tracing::warn!(var = r.var, value = %r.value, "ignoring invalid env override");
        }
    }
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Load the effective configuration: file (if present), then env overrides, then validation.
///
/// `explicit` is the `--config` flag; when given, the file must exist.
///
/// # Errors
///
/// Returns an error if a config file exists but is invalid, or validation fails.
pub fn load_effective(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    load_effective_with(explicit, |key| std::env::var(key).ok())
}

/// [`load_effective`] with an injectable env resolver (for testing).
///
/// # Errors
///
/// Same as [`load_effective`].
pub fn load_effective_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<LoadedConfig> {
    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let path = match env("STRAYLIGHT_CONFIG") {
                Some(p) => PathBuf::from(p),
                None => config_dir()?.join("config.toml"),
            };
            path.exists().then_some(path)
        }
    };
    let mut config = match &source {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let rejected = config.apply_overrides(env);
    config.validate()?;
    Ok(LoadedConfig {
        config,
        source,
        rejected,
    })
}

/// Resolve the default config directory (`~/.straylight/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".straylight"))
}

/// Resolve the log directory: `logging.dir` or `~/.straylight/logs`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn logs_dir(config: &Config) -> anyhow::Result<PathBuf> {
    match &config.logging.dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(config_dir()?.join("logs")),
    }
}

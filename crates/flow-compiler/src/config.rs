//! Compiler configuration.
//!
//! Settings are layered: defaults, then an optional TOML file, then `FLOW_*`
//! environment variables, then command-line flags.

use crate::serialize::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "FLOW_";

/// Accepted `log_level` values
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for one `Compiler`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub output_format: OutputFormat,
    /// Single-line JSON and unpadded TOML
    pub compact: bool,
    /// Validation errors fail the compilation
    pub strict: bool,
    pub optimize: bool,
    /// Opt-in merging of near-identical tasks
    pub merge_similar_tasks: bool,
    /// Largest accepted source, in bytes
    pub max_file_size: usize,
    pub max_tokens: usize,
    /// Wall-clock limit for one compilation; 0 disables it
    pub parse_timeout_secs: u64,
    pub log_level: String,
    pub debug: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Json,
            compact: false,
            strict: true,
            optimize: true,
            merge_similar_tasks: false,
            max_file_size: 10 * 1024 * 1024,
            max_tokens: 100_000,
            parse_timeout_secs: 60,
            log_level: "warn".to_string(),
            debug: false,
        }
    }
}

impl CompilerConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str, path: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.check_log_level()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Defaults, the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(std::env::vars())?;
        Ok(config)
    }

    /// Apply `FLOW_*` overrides from `(key, value)` pairs. Other keys are ignored.
    pub fn apply_env_from<I, K, V>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "OUTPUT_FORMAT" => {
                    self.output_format = value.parse().map_err(|_| invalid(key, value, "json, yaml or toml"))?
                }
                "STRICT" => self.strict = parse_bool(key, value)?,
                "COMPACT" => self.compact = parse_bool(key, value)?,
                "OPTIMIZE" => self.optimize = parse_bool(key, value)?,
                "MERGE_SIMILAR" => self.merge_similar_tasks = parse_bool(key, value)?,
                "MAX_FILE_SIZE" => self.max_file_size = parse_number(key, value)?,
                "MAX_TOKENS" => self.max_tokens = parse_number(key, value)?,
                "PARSE_TIMEOUT" => self.parse_timeout_secs = parse_number(key, value)?,
                "LOG_LEVEL" => {
                    self.log_level = value.trim().to_ascii_lowercase();
                    self.check_log_level()?;
                }
                "DEBUG" => self.debug = parse_bool(key, value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// The wall-clock limit, or `None` when disabled.
    pub fn parse_timeout(&self) -> Option<Duration> {
        (self.parse_timeout_secs > 0).then(|| Duration::from_secs(self.parse_timeout_secs))
    }

    /// The effective tracing level: `debug` wins over `log_level`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    fn check_log_level(&self) -> ConfigResult<()> {
        if LOG_LEVELS.contains(&self.log_level.as_str()) {
            Ok(())
        } else {
            Err(invalid("log_level", &self.log_level, "error, warn, info, debug or trace"))
        }
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "a boolean")),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "a non-negative integer"))
}

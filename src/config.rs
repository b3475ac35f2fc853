use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::RetryPolicy;
use crate::resolv_conf::DEFAULT_PATH;
use crate::walker::WalkBoundary;

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_resolv_conf")]
    pub resolv_conf: PathBuf,
    /// Port for local resolvers without an explicit one, and for authoritative servers
    #[serde(default = "default_port")]
    pub port: u16,
    /// Extra local resolvers, appended after resolv.conf's
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub walk: WalkConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Attempts per question
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Read timeout per exchange
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WalkConfig {
    /// 1 walks to the TLD; 2 stops at bare two-label names (breaks on co.uk)
    #[serde(default = "default_min_labels")]
    pub min_labels: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolv_conf: default_resolv_conf(),
            port: default_port(),
            nameservers: Vec::new(),
            query: QueryConfig::default(),
            walk: WalkConfig::default(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            timeout_ms: default_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self { min_labels: default_min_labels() }
    }
}

// Default value functions
fn default_resolv_conf() -> PathBuf { PathBuf::from(DEFAULT_PATH) }
fn default_port() -> u16 { 53 }
fn default_retries() -> u32 { 3 }
fn default_timeout_ms() -> u64 { 5000 }
fn default_initial_backoff_ms() -> u64 { 1000 }
fn default_backoff_factor() -> f64 { 2.0 }
fn default_max_backoff_ms() -> u64 { 30_000 }
fn default_min_labels() -> usize { 1 }

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the run needs, after file and CLI are merged
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub boundary: WalkBoundary,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let retries = self.query.retries;
        let timeout = Duration::from_millis(self.query.timeout_ms);

        if retries == 0 {
            return Err(ConfigError::Invalid("retries must be at least 1".into()));
        }
        if timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".into()));
        }
        if !(self.query.backoff_factor >= 1.0 && self.query.backoff_factor.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.query.backoff_factor
            )));
        }
        if self.query.max_backoff_ms < self.query.initial_backoff_ms {
            return Err(ConfigError::Invalid("max_backoff_ms must not be below initial_backoff_ms".into()));
        }
        if self.walk.min_labels == 0 {
            return Err(ConfigError::Invalid("walk.min_labels must be at least 1".into()));
        }

        Ok(Settings {
            port: self.port,
            timeout,
            retry: RetryPolicy {
                max_attempts: retries,
                initial_delay: Duration::from_millis(self.query.initial_backoff_ms),
                backoff_factor: self.query.backoff_factor,
                max_delay: Duration::from_millis(self.query.max_backoff_ms),
            },
            boundary: WalkBoundary::with_min_labels(self.walk.min_labels),
        })
    }
}

/// Go-style durations: `5s`, `500ms`, `1m30s`, `2h`. A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }
    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    if input.chars().all(is_number) {
        return to_nanos(input, 1_000_000_000).map(Duration::from_nanos);
    }

    let mut total: u64 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration '{}': expected a number", input));
        }
        let number = &rest[..digits];
        rest = &rest[digits..];

        let unit_len = rest.find(is_number).unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("invalid duration '{}': missing unit", input)),
            unit => return Err(format!("invalid duration '{}': unknown unit '{}'", input, unit)),
        };
        total = total
            .checked_add(to_nanos(number, nanos_per_unit)?)
            .ok_or_else(|| format!("invalid duration '{}': too large", input))?;
        rest = &rest[unit_len..];
    }
    Ok(Duration::from_nanos(total))
}

fn to_nanos(number: &str, nanos_per_unit: u64) -> Result<u64, String> {
    let value: f64 = number.parse().map_err(|_| format!("bad number '{}'", number))?;
    let nanos = (value * nanos_per_unit as f64).round();
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(format!("duration '{}' is too large", number));
    }
    Ok(nanos as u64)
}

//! Gatekeeper configuration settings

use crate::error::{Error, Result as GateResult};
use crate::models::Role;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration for the gatekeeper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Server listening address
    pub listen_addr: SocketAddr,

    /// Log level configuration
    pub log_level: String,

    /// Application logging configuration
    pub logging: LoggingConfig,

    /// Request audit log configuration
    pub audit: AuditConfig,

    /// Allowed clock-hour window
    pub time_window: TimeWindowConfig,

    /// Per-client POST throttle
    pub rate_limit: RateLimitConfig,

    /// Role allow-list
    pub roles: RoleConfig,

    /// Upstream messaging app; requests are answered locally when absent
    pub upstream: Option<UpstreamConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write application logs to a daily rolling file as well as the console
    pub enable_file_logging: bool,

    /// Directory for rolling log files
    pub log_dir: PathBuf,
}

/// Audit log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only audit file; audit lines go to tracing when unset
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindowConfig {
    pub enabled: bool,

    /// First allowed hour (0-23)
    pub start_hour: u32,

    /// First disallowed hour (0-23), exclusive upper bound
    pub end_hour: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Maximum POST requests per client within the window
    pub max_messages: usize,

    /// Sliding window length in seconds
    pub window_seconds: u64,

    /// How often idle clients are dropped from memory, 0 disables the sweep
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub enabled: bool,
    pub allowed_roles: Vec<Role>,
}

/// Upstream server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the messaging app, e.g. http://127.0.0.1:8000
    pub url: String,

    /// Upstream request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

fn default_upstream_timeout() -> u64 {
    30
}

/// Held by tests that set or read `GATEKEEPER_*` variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            logging: LoggingConfig::default(),
            audit: AuditConfig::default(),
            time_window: TimeWindowConfig::default(),
            rate_limit: RateLimitConfig::default(),
            roles: RoleConfig::default(),
            upstream: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_file_logging: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Default for TimeWindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 18,
            end_hour: 21,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: 5,
            window_seconds: 60,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_roles: vec![Role::Admin, Role::Host],
        }
    }
}

impl GatekeeperConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: GatekeeperConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load configuration from an optional YAML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::from_yaml_file(path.as_ref())?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `GATEKEEPER_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("GATEKEEPER_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .with_context(|| format!("Invalid GATEKEEPER_LISTEN_ADDR: {}", addr))?;
        }

        if let Ok(url) = std::env::var("GATEKEEPER_UPSTREAM_URL") {
            let timeout_secs = self
                .upstream
                .as_ref()
                .map(|u| u.timeout_secs)
                .unwrap_or_else(default_upstream_timeout);
            self.upstream = Some(UpstreamConfig { url, timeout_secs });
        }

        if let Ok(file) = std::env::var("GATEKEEPER_AUDIT_FILE") {
            self.audit.file = Some(PathBuf::from(file));
        }

        if let Ok(max) = std::env::var("GATEKEEPER_RATE_LIMIT_MAX") {
            self.rate_limit.max_messages = max
                .parse()
                .with_context(|| format!("Invalid GATEKEEPER_RATE_LIMIT_MAX: {}", max))?;
        }

        if let Ok(window) = std::env::var("GATEKEEPER_RATE_LIMIT_WINDOW") {
            self.rate_limit.window_seconds = window
                .parse()
                .with_context(|| format!("Invalid GATEKEEPER_RATE_LIMIT_WINDOW: {}", window))?;
        }

        if let Ok(start) = std::env::var("GATEKEEPER_WINDOW_START") {
            self.time_window.start_hour = start
                .parse()
                .with_context(|| format!("Invalid GATEKEEPER_WINDOW_START: {}", start))?;
        }

        if let Ok(end) = std::env::var("GATEKEEPER_WINDOW_END") {
            self.time_window.end_hour = end
                .parse()
                .with_context(|| format!("Invalid GATEKEEPER_WINDOW_END: {}", end))?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> GateResult<()> {
        if self.time_window.start_hour > 23 || self.time_window.end_hour > 23 {
            return Err(Error::Config(format!(
                "time window hours must be within 0-23 (got {}..{})",
                self.time_window.start_hour, self.time_window.end_hour
            )));
        }

        if self.rate_limit.max_messages == 0 {
            return Err(Error::Config("rate_limit.max_messages must be positive".to_string()));
        }

        if self.rate_limit.window_seconds == 0 {
            return Err(Error::Config("rate_limit.window_seconds must be positive".to_string()));
        }

        if self.roles.enabled && self.roles.allowed_roles.is_empty() {
            return Err(Error::Config("roles.allowed_roles must not be empty".to_string()));
        }

        if let Some(upstream) = &self.upstream {
            upstream.url.parse::<hyper::Uri>()?;
        }

        Ok(())
    }
}

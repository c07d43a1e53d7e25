//! Server management CLI commands

use crate::config::{GatekeeperConfig, UpstreamConfig};
use crate::proxy::GatekeeperServer;
use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(long, default_value = "config.yml")]
    pub config: PathBuf,

    /// Listening address, overrides the config file
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Upstream messaging app URL, overrides the config file
    #[arg(long)]
    pub upstream: Option<String>,

    /// Audit log file, overrides the config file
    #[arg(long)]
    pub audit_file: Option<PathBuf>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.yml"),
            listen_addr: None,
            upstream: None,
            audit_file: None,
        }
    }
}

impl ServeArgs {
    /// Load the config file and layer CLI overrides on top
    pub fn to_config(&self) -> Result<GatekeeperConfig> {
        let mut config = GatekeeperConfig::load(&self.config)?;

        if let Some(addr) = &self.listen_addr {
            config.listen_addr = addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid listen address '{}'", addr))?;
        }

        if let Some(url) = &self.upstream {
            let timeout_secs = config.upstream.as_ref().map(|u| u.timeout_secs).unwrap_or(30);
            config.upstream = Some(UpstreamConfig {
                url: url.clone(),
                timeout_secs,
            });
        }

        if let Some(file) = &self.audit_file {
            config.audit.file = Some(file.clone());
        }

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    /// Start the gatekeeper with the resolved configuration
    pub async fn start_server(&self, config: GatekeeperConfig) -> Result<()> {
        info!("📋 Gatekeeper configuration:");
        info!("   Listen: {}", config.listen_addr);
        match &config.upstream {
            Some(upstream) => info!("   Upstream: {} (timeout {}s)", upstream.url, upstream.timeout_secs),
            None => info!("   Upstream: none"),
        }
        if config.time_window.enabled {
            info!(
                "   Time window: {}:00-{}:00",
                config.time_window.start_hour, config.time_window.end_hour
            );
        }
        if config.rate_limit.enabled {
            info!(
                "   Rate limit: {} POSTs per {}s",
                config.rate_limit.max_messages, config.rate_limit.window_seconds
            );
        }
        if config.roles.enabled {
            let roles: Vec<&str> = config.roles.allowed_roles.iter().map(|r| r.as_str()).collect();
            info!("   Allowed roles: {}", roles.join(", "));
        }

        let server = GatekeeperServer::from_config(&config).context("Failed to build gatekeeper")?;
        server.start().await.context("Gatekeeper server failed")
    }
}

/// Load, validate and print the effective configuration
#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// YAML configuration file
    #[arg(long, default_value = "config.yml")]
    pub config: PathBuf,
}

impl CheckConfigArgs {
    pub fn execute(&self) -> Result<String> {
        let config = GatekeeperConfig::load(&self.config)?;
        let rendered = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::ENV_LOCK;
    use std::io::Write;
    use std::sync::{MutexGuard, PoisonError};
    use tempfile::NamedTempFile;

    fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn test_cli_overrides_file() {
        let _env = env_guard();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr: 127.0.0.1:9000\nupstream:\n  url: http://127.0.0.1:8000\n  timeout_secs: 5").unwrap();

        let args = ServeArgs {
            config: file.path().to_path_buf(),
            listen_addr: Some("0.0.0.0:7000".to_string()),
            upstream: Some("http://10.0.0.2:8000".to_string()),
            audit_file: Some(PathBuf::from("audit/requests.log")),
        };

        let config = args.to_config().unwrap();
        assert_eq!(config.listen_addr.port(), 7000);
        let upstream = config.upstream.unwrap();
        assert_eq!(upstream.url, "http://10.0.0.2:8000");
        assert_eq!(upstream.timeout_secs, 5);
        assert_eq!(config.audit.file, Some(PathBuf::from("audit/requests.log")));
    }

    #[test]
    fn test_invalid_listen_addr() {
        let _env = env_guard();
        let args = ServeArgs {
            config: PathBuf::from("/nonexistent/config.yml"),
            listen_addr: Some("not-an-address".to_string()),
            ..ServeArgs::default()
        };
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_check_config_renders_yaml() {
        let _env = env_guard();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rate_limit:\n  max_messages: 9").unwrap();

        let rendered = CheckConfigArgs {
            config: file.path().to_path_buf(),
        }
        .execute()
        .unwrap();
        assert!(rendered.contains("max_messages: 9"));
        assert!(rendered.contains("- admin"));
    }

    #[test]
    fn test_check_config_rejects_invalid_hours() {
        let _env = env_guard();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time_window:\n  start_hour: 25").unwrap();

        let result = CheckConfigArgs {
            config: file.path().to_path_buf(),
        }
        .execute();
        assert!(result.is_err());
    }
}

//! Server configuration

use crate::{Result, ServerError};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenant_authz::AuthzConfig;

/// Server configuration
///
/// The authorization sections (`source`, `store`, `decision`) sit at the
/// top level of the JSON document next to the server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// gRPC listen address
    pub listen_addr: String,
    /// Periodic store reload, in seconds (0 disables)
    pub reload_interval_secs: u64,
    /// Authorization settings
    #[serde(flatten)]
    pub authz: AuthzConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9001".into(),
            reload_interval_secs: 0,
            authz: AuthzConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ServerError::Config(e.to_string()))?;
        config.authz.decision.validate()?;
        Ok(config)
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid listen_addr {}: {e}", self.listen_addr)))
    }

    /// Reload period, if enabled
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }
}

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "tenant-authz-server", version, about = "Per-tenant ext_authz decision point")]
pub struct Args {
    /// Config file (JSON)
    #[arg(short, long, env = "TENANT_AUTHZ_CONFIG", default_value = "/etc/tenant-authz/config.json")]
    pub config: PathBuf,

    /// gRPC listen address
    #[arg(long, env = "TENANT_AUTHZ_LISTEN")]
    pub listen: Option<String>,

    /// Directory with one credential file per tenant
    #[arg(long, env = "TENANT_AUTHZ_CREDENTIALS_DIR")]
    pub credentials_dir: Option<PathBuf>,

    /// Store reload period in seconds (0 disables)
    #[arg(long, env = "TENANT_AUTHZ_RELOAD_INTERVAL")]
    pub reload_interval: Option<u64>,
}

impl Args {
    /// Config file merged with command line overrides
    ///
    /// A missing config file falls back to defaults; an unparsable one is an
    /// error.
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = match ServerConfig::load(&self.config) {
            Ok(config) => config,
            Err(ServerError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Config {} not found, using defaults", self.config.display());
                ServerConfig::default()
            }
            Err(e) => return Err(e),
        };

        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(dir) = &self.credentials_dir {
            config.authz.source.directory = dir.clone();
        }
        if let Some(secs) = self.reload_interval {
            config.reload_interval_secs = secs;
        }
        Ok(config)
    }
}

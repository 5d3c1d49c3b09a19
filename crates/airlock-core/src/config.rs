//! Environment configuration: which ports to free, which services to run,
//! which remote endpoints to sever.
//!
//! The configuration is a plain JSON file merged over built-in defaults.
//! A missing file is not an error (the defaults describe a complete local
//! environment); a malformed file is.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::pattern::BlockPattern;

/// Ports reclaimed before any service starts: the proxy port and the
/// default Ollama port.
pub const DEFAULT_TARGET_PORTS: [u16; 2] = [8080, 11434];

/// Default listen port for the loopback proxy.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// Default inference backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";

/// One managed service: a launch target plus the port it is expected to
/// occupy once healthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    /// Bare command name (resolved on `PATH`) or a filesystem path.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Port the service is expected to listen on, for reporting only.
    #[serde(default)]
    pub port: Option<u16>,
}

/// Per-case switches for the readiness check suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckToggles {
    #[serde(default = "default_true")]
    pub startup_fluency: bool,
    #[serde(default = "default_true")]
    pub port_conflicts: bool,
    #[serde(default = "default_true")]
    pub environment_access: bool,
    #[serde(default = "default_true")]
    pub service_probes: bool,
    #[serde(default = "default_true")]
    pub offline_guard: bool,
}

impl Default for CheckToggles {
    fn default() -> Self {
        Self {
            startup_fluency: true,
            port_conflicts: true,
            environment_access: true,
            service_probes: true,
            offline_guard: true,
        }
    }
}

/// The whole launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Ports cleared by the reaper before services start.
    #[serde(default = "default_target_ports")]
    pub target_ports: Vec<u16>,
    /// Services launched and supervised, in order.
    #[serde(default = "default_services")]
    pub services: Vec<ServiceSpec>,
    /// Variables injected into every launched service.
    #[serde(default = "default_environment")]
    pub environment: BTreeMap<String, String>,
    /// Remote endpoints whose live connections are severed.
    #[serde(default)]
    pub blocked_domains: Vec<BlockPattern>,
    /// Explicit inference backend URL; when absent, `OLLAMA_HOST` and then
    /// [`DEFAULT_BACKEND_URL`] apply.
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    /// When false, the port-reap phase is skipped entirely.
    #[serde(default = "default_true")]
    pub cleanup_on_startup: bool,
    #[serde(default)]
    pub checks: CheckToggles,
    /// Seconds the reaper waits after killing listeners so the OS releases
    /// the sockets.
    #[serde(default = "default_reap_grace_secs")]
    pub reap_grace_secs: u64,
    /// Seconds a freshly spawned service gets before its first liveness
    /// probe.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Seconds a service gets to exit gracefully before it is killed.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_target_ports() -> Vec<u16> {
    DEFAULT_TARGET_PORTS.to_vec()
}

fn default_services() -> Vec<ServiceSpec> {
    vec![ServiceSpec {
        name: "proxy".to_string(),
        command: "airlock".to_string(),
        args: vec!["serve".to_string()],
        port: Some(DEFAULT_PROXY_PORT),
    }]
}

fn default_environment() -> BTreeMap<String, String> {
    BTreeMap::from([("OLLAMA_HOST".to_string(), DEFAULT_BACKEND_URL.to_string())])
}

fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

fn default_reap_grace_secs() -> u64 {
    2
}

fn default_settle_secs() -> u64 {
    3
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        // serde and Default must agree, so route through the field fns.
        Self {
            target_ports: default_target_ports(),
            services: default_services(),
            environment: default_environment(),
            blocked_domains: Vec::new(),
            backend_url: None,
            proxy_port: default_proxy_port(),
            cleanup_on_startup: true,
            checks: CheckToggles::default(),
            reap_grace_secs: default_reap_grace_secs(),
            settle_secs: default_settle_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl EnvironmentConfig {
    /// Load the configuration from `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(source) => {
                return Err(ConfigError::Io { path: path.display().to_string(), source });
            }
        };

        let config: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        debug!(
            services = config.services.len(),
            ports = config.target_ports.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Reject configurations the orchestrator cannot act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy_port == 0 {
            return Err(ConfigError::InvalidProxyPort);
        }
        let mut seen = std::collections::BTreeSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
        }
        Ok(())
    }

    /// Resolved inference backend URL: explicit config value, then the
    /// `OLLAMA_HOST` environment variable, then [`DEFAULT_BACKEND_URL`].
    #[must_use]
    pub fn backend_url(&self) -> String {
        resolve_backend_url(self.backend_url.as_deref(), std::env::var("OLLAMA_HOST").ok())
    }

    #[must_use]
    pub const fn reap_grace(&self) -> Duration {
        Duration::from_secs(self.reap_grace_secs)
    }

    #[must_use]
    pub const fn settle_interval(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn resolve_backend_url(explicit: Option<&str>, env_value: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(env_value)
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

/// Configuration that cannot be loaded or acted on.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate service name: {0}")]
    DuplicateService(String),

    #[error("proxy port must be non-zero")]
    InvalidProxyPort,
}

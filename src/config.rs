//! Server configuration.
//!
//! Every field has a default, so an empty (or absent) YAML document is a
//! valid configuration. `Config::load` reads the file named by
//! `SWITCHYARD_CONFIG` when it is set, then lets `LISTEN` override the
//! listen address.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub dispatch: DispatchConfig,
    pub handshake: HandshakeConfig,
    pub simulation: SimulationConfig,
    pub external: ExternalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Bytes pulled from a socket per read call.
    pub read_chunk: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub deadline_ms: u64,
    pub max_body_bytes: usize,
    /// Upper bound on threads running handlers.
    pub max_workers: usize,
    pub runtime_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub poll_interval_ms: u64,
    pub process_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub service_available: bool,
    pub external_service_available: bool,
    pub long_timeout: bool,
    pub long_operation_ms: u64,
    pub list_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub available_url: String,
    pub unavailable_url: String,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8081".to_string(),
            read_chunk: 1024,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 10_000,
            max_body_bytes: 1024 * 1024,
            max_workers: 64,
            runtime_threads: 4,
        }
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            process_delay_ms: 5_000,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            service_available: true,
            external_service_available: true,
            long_timeout: false,
            long_operation_ms: 11_000,
            list_delay_ms: 5_000,
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            available_url: "https://jsonplaceholder.typicode.com/posts/1".to_string(),
            unavailable_url: "https://jsonplaceholder.typicode.com/post/1".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl DispatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl HandshakeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn process_delay(&self) -> Duration {
        Duration::from_millis(self.process_delay_ms)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("SWITCHYARD_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {path}"))?;
                Self::from_yaml(&raw).with_context(|| format!("Invalid config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen;
        }

        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

// SPDX-License-Identifier: MIT

//! Configuration loading
//!
//! Settings come from one YAML file; every section has defaults so an empty
//! file (or no file at all) yields a working in-memory setup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::flow::error::{FlowError, Result};
use crate::flow::graph::DEFAULT_MAX_ITERATIONS;
use crate::flow::retry::RetryPolicy;
use crate::studio::nodes;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "POSTFLOW_CONFIG";
/// Environment variable overriding the server port
pub const PORT_ENV: &str = "POSTFLOW_PORT";
/// File picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "postflow.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub nodes: HashMap<String, NodeConfig>,
    pub collaborators: CollaboratorConfig,
    pub storage: StorageConfig,
}

impl StudioConfig {
    /// Invocation bound for `node`, configured or built in
    pub fn node_timeout(&self, node: &str) -> Option<Duration> {
        match self.nodes.get(node).and_then(|n| n.timeout_secs) {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => default_timeout(node),
        }
    }

    pub fn node_retry(&self, node: &str) -> RetryPolicy {
        self.nodes
            .get(node)
            .map(|n| n.retry.clone())
            .unwrap_or_default()
    }
}

fn default_timeout(node: &str) -> Option<Duration> {
    let secs = match node {
        nodes::UNDERSTAND_REQUEST | nodes::GENERATE_STRATEGY | nodes::GENERATE_CONTENT => 240,
        nodes::GENERATE_MATERIAL => 900,
        nodes::PUBLISH => 120,
        nodes::RECORD_RESULT => 30,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_iterations: usize,
    /// Events buffered per subscriber before sends start waiting
    pub event_buffer: usize,
    /// How long a send may wait on a slow subscriber
    pub send_timeout_ms: u64,
}

impl EngineConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_buffer: 64,
            send_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub timeout_secs: Option<u64>,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub base_url: String,
    pub paths: EndpointPaths,
    pub request_timeout_secs: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            paths: EndpointPaths::default(),
            request_timeout_secs: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub understand: String,
    pub strategy: String,
    pub material: String,
    pub content: String,
    pub publish: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            understand: "/understand".to_string(),
            strategy: "/strategy".to_string(),
            material: "/material".to_string(),
            content: "/content".to_string(),
            publish: "/publish".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            path: PathBuf::from("data/runs.jsonl"),
        }
    }
}

/// Loads `StudioConfig` from YAML
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<StudioConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config = Self::parse_yaml(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<StudioConfig> {
        if content.trim().is_empty() {
            return Ok(StudioConfig::default());
        }
        let config: StudioConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Resolve the config file from an explicit path, `POSTFLOW_CONFIG` or
    /// `postflow.yaml`, then apply `POSTFLOW_PORT`
    pub fn from_env(explicit: Option<&Path>) -> Result<StudioConfig> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE)?,
            None => {
                log::info!("No configuration file, using defaults");
                StudioConfig::default()
            }
        };
        Self::apply_port_override(config, std::env::var(PORT_ENV).ok().as_deref())
    }

    fn apply_port_override(mut config: StudioConfig, port: Option<&str>) -> Result<StudioConfig> {
        if let Some(port) = port {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|_| FlowError::config(format!("{} is not a valid port: {}", PORT_ENV, port)))?;
        }
        Ok(config)
    }
}

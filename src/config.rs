//! Terminal configuration.
//!
//! Loaded from a JSON file; every key is optional:
//!
//! ```json
//! {
//!   "nos_connection_string": "tcp://127.0.0.1:12001",
//!   "connections": { "lab": "tcp://10.0.0.1:12001" },
//!   "term_node_name": "terminal",
//!   "sim_commanded": "time",
//!   "start_bus": "command",
//!   "bus_type": "BASE",
//!   "input_mode": "ASCII",
//!   "output_mode": "HEX",
//!   "prompt": "SHORT",
//!   "suppress_output": false,
//!   "udp_port": 5555,
//!   "startup_commands": ["SET SIMNODE 64"]
//! }
//! ```

use crate::session::{BusType, IoMode, PromptStyle};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_NOS_CONNECTION_STRING: &str = "tcp://127.0.0.1:12001";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub nos_connection_string: String,
    /// Extra named connection strings besides `default`.
    pub connections: BTreeMap<String, String>,
    pub term_node_name: String,
    pub sim_commanded: String,
    pub start_bus: String,
    /// Inferred from `start_bus` when absent.
    pub bus_type: Option<BusType>,
    pub input_mode: IoMode,
    pub output_mode: IoMode,
    pub prompt: PromptStyle,
    pub suppress_output: bool,
    /// Serve commands over UDP on this port instead of the console.
    pub udp_port: Option<u16>,
    pub startup_commands: Vec<String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            nos_connection_string: DEFAULT_NOS_CONNECTION_STRING.to_string(),
            connections: BTreeMap::new(),
            term_node_name: "terminal".to_string(),
            sim_commanded: "time".to_string(),
            start_bus: "command".to_string(),
            bus_type: None,
            input_mode: IoMode::Ascii,
            output_mode: IoMode::Ascii,
            prompt: PromptStyle::Long,
            suppress_output: false,
            udp_port: None,
            startup_commands: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TerminalConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

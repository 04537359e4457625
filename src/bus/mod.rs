//! Bus connections and their lifecycle.
//!
//! A [`BusConnection`] is the capability set the terminal needs from any
//! simulated bus: write, read, transact and target selection. Concrete
//! connections live in [`connections`], talk to the simulation backend
//! through a [`link::BusLink`], and are created by a [`ConnectionFactory`]
//! from a [`ConnectionSpec`]. [`BusConnectionManager`] owns the single live
//! connection.

pub mod connections;
pub mod link;
pub mod manager;

pub use connections::LinkConnector;
pub use manager::BusConnectionManager;

use crate::codec::{leading_number, ReadBuffer};
use crate::session::{BusType, SessionState};
use thiserror::Error;
use tracing::warn;

/// Master address/identifier used when the terminal node is not a number.
pub const DEFAULT_MASTER_ADDRESS: u32 = 127;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Connection has not been instantiated. Connect to a bus with SET SIMBUS.")]
    NotConnected,
    /// Failure reported by the connection or the backend; shown verbatim.
    #[error("{0}")]
    Runtime(String),
    #[error("Unsupported connection string \"{0}\"")]
    UnsupportedConnectionString(String),
    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backend protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
}

impl BusError {
    pub fn runtime(message: impl Into<String>) -> Self {
        BusError::Runtime(message.into())
    }
}

/// Operations every simulated bus connection supports.
pub trait BusConnection: Send {
    fn bus_type(&self) -> BusType;
    fn write(&mut self, data: &[u8]) -> Result<(), BusError>;
    fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError>;
    fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError>;
    fn set_target(&mut self, target: &str) -> Result<(), BusError>;
}

/// Everything needed to build one connection variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    I2c {
        master_address: u32,
        connection_string: String,
        bus_name: String,
    },
    Can {
        master_identifier: u32,
        connection_string: String,
        bus_name: String,
    },
    Spi {
        connection_string: String,
        bus_name: String,
    },
    Uart {
        node_name: String,
        connection_string: String,
        bus_name: String,
    },
    Base {
        node_name: String,
        connection_string: String,
        bus_name: String,
    },
}

impl ConnectionSpec {
    /// Select the connection variant for the session's bus type.
    ///
    /// I2C and CAN need a numeric terminal node; a non-numeric one falls back
    /// to [`DEFAULT_MASTER_ADDRESS`], is rewritten in `state` and noted.
    pub fn resolve(state: &mut SessionState, diagnostics: &mut Diagnostics) -> Self {
        let connection_string = state.connection_string.clone();
        let bus_name = state.bus_name.clone();
        match state.bus_type {
            BusType::I2c => ConnectionSpec::I2c {
                master_address: master_number(state, "I2C address", diagnostics),
                connection_string,
                bus_name,
            },
            BusType::Can => ConnectionSpec::Can {
                master_identifier: master_number(state, "CAN identifier", diagnostics),
                connection_string,
                bus_name,
            },
            BusType::Spi => ConnectionSpec::Spi {
                connection_string,
                bus_name,
            },
            BusType::Uart => ConnectionSpec::Uart {
                node_name: state.terminal_node_name.clone(),
                connection_string,
                bus_name,
            },
            BusType::Base | BusType::Command => ConnectionSpec::Base {
                node_name: state.terminal_node_name.clone(),
                connection_string,
                bus_name,
            },
        }
    }

    pub fn connection_string(&self) -> &str {
        match self {
            ConnectionSpec::I2c { connection_string, .. }
            | ConnectionSpec::Can { connection_string, .. }
            | ConnectionSpec::Spi { connection_string, .. }
            | ConnectionSpec::Uart { connection_string, .. }
            | ConnectionSpec::Base { connection_string, .. } => connection_string,
        }
    }

    pub fn bus_name(&self) -> &str {
        match self {
            ConnectionSpec::I2c { bus_name, .. }
            | ConnectionSpec::Can { bus_name, .. }
            | ConnectionSpec::Spi { bus_name, .. }
            | ConnectionSpec::Uart { bus_name, .. }
            | ConnectionSpec::Base { bus_name, .. } => bus_name,
        }
    }
}

fn master_number(state: &mut SessionState, what: &str, diagnostics: &mut Diagnostics) -> u32 {
    if let Some(number) = leading_number::<u32>(&state.terminal_node_name) {
        return number;
    }
    diagnostics.note(format!(
        "\"{}\" is not a valid {} for the terminal. Defaulting to {}.",
        state.terminal_node_name, what, DEFAULT_MASTER_ADDRESS
    ));
    state.terminal_node_name = DEFAULT_MASTER_ADDRESS.to_string();
    DEFAULT_MASTER_ADDRESS
}

/// Builds connections from specs. The manager calls this on every reset.
pub trait ConnectionFactory: Send {
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn BusConnection>, BusError>;
}

/// User-facing notes raised while processing one command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    notes: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.notes.push(message);
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn take(&mut self) -> Vec<String> {
        core::mem::take(&mut self.notes)
    }
}

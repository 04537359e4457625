use super::{BusConnection, BusError, ConnectionFactory, ConnectionSpec, Diagnostics};
use crate::codec::{ReadBuffer, MAX_TRANSFER_LEN};
use crate::session::SessionState;
use tracing::{debug, info};

/// Owns the one live bus connection and rebuilds it on settings changes.
pub struct BusConnectionManager {
    factory: Box<dyn ConnectionFactory>,
    connection: Option<Box<dyn BusConnection>>,
    reset_count: u32,
}

impl BusConnectionManager {
    pub fn new(factory: Box<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            connection: None,
            reset_count: 0,
        }
    }

    /// Drop the current connection and build the one `state` calls for.
    ///
    /// Must run whenever the bus type, bus name, terminal node or backend
    /// connection string changes. On error the slot is left empty, or, if
    /// only `set_target` failed, holding a connection with no target.
    pub fn reset(
        &mut self,
        state: &mut SessionState,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), BusError> {
        self.reset_count = self.reset_count.wrapping_add(1);

        if self.connection.take().is_some() {
            debug!("reset: dropped old bus connection");
        }

        let spec = ConnectionSpec::resolve(state, diagnostics);
        info!(
            "Connecting {} terminal \"{}\" to bus \"{}\" via {}",
            state.bus_type,
            state.terminal_node_name,
            spec.bus_name(),
            spec.connection_string()
        );
        let connection = self.factory.connect(&spec)?;
        let connection = self.connection.insert(connection);
        connection.set_target(&state.target_node_name)
    }

    pub fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.live()?.set_target(target)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.live()?.write(data)
    }

    /// Reads are capped at [`MAX_TRANSFER_LEN`] bytes.
    pub fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError> {
        self.live()?.read(len.min(MAX_TRANSFER_LEN))
    }

    pub fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError> {
        self.live()?.transact(data, read_len.min(MAX_TRANSFER_LEN))
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&dyn BusConnection> {
        self.connection.as_deref()
    }

    /// Number of resets attempted since creation.
    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    fn live(&mut self) -> Result<&mut Box<dyn BusConnection>, BusError> {
        self.connection.as_mut().ok_or(BusError::NotConnected)
    }
}

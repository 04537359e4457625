#![allow(dead_code)]

use simterm::codec::ReadBuffer;
use simterm::{BusConnection, BusError, BusType, ConnectionFactory, ConnectionSpec, SimTerminal, TerminalConfig};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything the mock connections were asked to do.
#[derive(Debug, Default)]
pub struct MockLog {
    pub connects: Vec<ConnectionSpec>,
    pub targets: Vec<String>,
    pub writes: Vec<Vec<u8>>,
    pub reads: Vec<usize>,
    pub transacts: Vec<(Vec<u8>, usize)>,
}

#[derive(Debug, Default)]
struct MockBehaviour {
    read_data: Vec<u8>,
    io_failure: Option<String>,
    target_failure: Option<String>,
    refused: Vec<String>,
}

/// Recording connection factory; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    log: Arc<Mutex<MockLog>>,
    behaviour: Arc<Mutex<MockBehaviour>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap()
    }

    /// Bytes handed back (zero padded) by reads and transacts.
    pub fn set_read_data(&self, data: &[u8]) {
        self.behaviour.lock().unwrap().read_data = data.to_vec();
    }

    /// Make every bus operation fail with `message`.
    pub fn fail_io_with(&self, message: &str) {
        self.behaviour.lock().unwrap().io_failure = Some(message.to_string());
    }

    /// Make every `set_target` fail with `message`.
    pub fn fail_target_with(&self, message: &str) {
        self.behaviour.lock().unwrap().target_failure = Some(message.to_string());
    }

    /// Refuse to connect to `connection_string`.
    pub fn refuse(&self, connection_string: &str) {
        self.behaviour
            .lock()
            .unwrap()
            .refused
            .push(connection_string.to_string());
    }

    fn reply(&self, len: usize) -> Result<ReadBuffer, BusError> {
        let behaviour = self.behaviour.lock().unwrap();
        if let Some(message) = &behaviour.io_failure {
            return Err(BusError::Runtime(message.clone()));
        }
        let mut buffer = ReadBuffer::new();
        for i in 0..len {
            buffer
                .push(behaviour.read_data.get(i).copied().unwrap_or(0))
                .unwrap();
        }
        Ok(buffer)
    }

    fn check_io(&self) -> Result<(), BusError> {
        match &self.behaviour.lock().unwrap().io_failure {
            Some(message) => Err(BusError::Runtime(message.clone())),
            None => Ok(()),
        }
    }
}

struct MockConnection {
    bus_type: BusType,
    factory: MockFactory,
}

impl BusConnection for MockConnection {
    fn bus_type(&self) -> BusType {
        self.bus_type
    }

    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.factory.check_io()?;
        self.factory.log().writes.push(data.to_vec());
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError> {
        self.factory.log().reads.push(len);
        self.factory.reply(len)
    }

    fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError> {
        self.factory.log().transacts.push((data.to_vec(), read_len));
        self.factory.reply(read_len)
    }

    fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.factory.log().targets.push(target.to_string());
        match &self.factory.behaviour.lock().unwrap().target_failure {
            Some(message) => Err(BusError::Runtime(message.clone())),
            None => Ok(()),
        }
    }
}

impl ConnectionFactory for MockFactory {
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn BusConnection>, BusError> {
        let refused = self
            .behaviour
            .lock()
            .unwrap()
            .refused
            .iter()
            .any(|uri| uri == spec.connection_string());
        if refused {
            return Err(BusError::Runtime(format!(
                "Could not connect to {}",
                spec.connection_string()
            )));
        }

        self.log().connects.push(spec.clone());
        let bus_type = match spec {
            ConnectionSpec::I2c { .. } => BusType::I2c,
            ConnectionSpec::Can { .. } => BusType::Can,
            ConnectionSpec::Spi { .. } => BusType::Spi,
            ConnectionSpec::Uart { .. } => BusType::Uart,
            ConnectionSpec::Base { .. } => BusType::Base,
        };
        Ok(Box::new(MockConnection {
            bus_type,
            factory: self.clone(),
        }))
    }
}

pub const DEFAULT_URI: &str = "mock://default";

pub fn test_config() -> TerminalConfig {
    TerminalConfig {
        nos_connection_string: DEFAULT_URI.to_string(),
        ..TerminalConfig::default()
    }
}

/// A started terminal wired to a fresh mock factory.
pub fn terminal() -> (SimTerminal, MockFactory) {
    terminal_with(&test_config())
}

pub fn terminal_with(config: &TerminalConfig) -> (SimTerminal, MockFactory) {
    let factory = MockFactory::new();
    let mut terminal = SimTerminal::new(config, Box::new(factory.clone()));
    terminal.start(&config.startup_commands);
    (terminal, factory)
}

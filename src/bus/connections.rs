use super::link::{open_link, BusLink, BusReply, BusRequest, Operation, Protocol, ReplyStatus};
use super::{BusConnection, BusError, ConnectionFactory, ConnectionSpec};
use crate::codec::{leading_number, ReadBuffer, MAX_TRANSFER_LEN};
use crate::session::BusType;
use tracing::{debug, info};

const LENGTH_MUST_BE_POSITIVE: &str = "Error: Length must be greater than zero.";
const REQUEST_TIMEOUT_MS: u64 = 5000;

/// Builds connections over the link named by a [`ConnectionSpec`]'s connection string.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkConnector;

impl ConnectionFactory for LinkConnector {
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn BusConnection>, BusError> {
        let link = open_link(spec.connection_string())?;
        let connection: Box<dyn BusConnection> = match spec {
            ConnectionSpec::I2c {
                master_address,
                bus_name,
                ..
            } => Box::new(I2cConnection::new(*master_address, bus_name, link)?),
            ConnectionSpec::Can {
                master_identifier,
                bus_name,
                ..
            } => Box::new(CanConnection::new(*master_identifier, bus_name, link)?),
            ConnectionSpec::Spi { bus_name, .. } => Box::new(SpiConnection::new(bus_name, link)?),
            ConnectionSpec::Uart {
                node_name,
                bus_name,
                ..
            } => Box::new(UartConnection::new(node_name, bus_name, link)?),
            ConnectionSpec::Base {
                node_name,
                bus_name,
                ..
            } => Box::new(BaseConnection::new(node_name, bus_name, link)?),
        };
        Ok(connection)
    }
}

/// One node's view of a bus: who we are, who we talk to, and the link.
struct Endpoint {
    link: Box<dyn BusLink>,
    protocol: Protocol,
    bus: String,
    source: String,
    target: String,
}

impl Endpoint {
    fn attach(
        link: Box<dyn BusLink>,
        protocol: Protocol,
        bus: &str,
        source: String,
    ) -> Result<Self, BusError> {
        let mut endpoint = Self {
            link,
            protocol,
            bus: bus.to_string(),
            source,
            target: String::new(),
        };
        let reply = endpoint.send(Operation::Attach)?;
        expect_success(reply)?;
        Ok(endpoint)
    }

    fn send(&mut self, operation: Operation) -> Result<BusReply, BusError> {
        let request = BusRequest {
            bus: self.bus.clone(),
            protocol: self.protocol,
            source: self.source.clone(),
            target: self.target.clone(),
            operation,
        };
        self.link.exchange(&request)
    }

    fn numeric_target(&self, complaint: impl FnOnce(&str) -> String) -> Result<u32, BusError> {
        leading_number(&self.target).ok_or_else(|| BusError::Runtime(complaint(&self.target)))
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        debug!("Releasing {:?} handle on bus {}", self.protocol, self.bus);
    }
}

fn expect_success(reply: BusReply) -> Result<Vec<u8>, BusError> {
    if reply.status == ReplyStatus::Success {
        return Ok(reply.data);
    }
    let status = reply.status;
    Err(BusError::Runtime(
        reply
            .message
            .unwrap_or_else(|| format!("Bus backend reported {status:?}")),
    ))
}

/// Copy exactly `len` bytes, zero-filling a short reply and dropping extra.
fn fill(data: &[u8], len: usize) -> ReadBuffer {
    let len = len.min(MAX_TRANSFER_LEN);
    let mut buffer = ReadBuffer::new();
    for i in 0..len {
        // capacity was checked above
        let _ = buffer.push(data.get(i).copied().unwrap_or(0));
    }
    buffer
}

fn check_length(len: usize) -> Result<(), BusError> {
    if len == 0 {
        Err(BusError::runtime(LENGTH_MUST_BE_POSITIVE))
    } else {
        Ok(())
    }
}

fn log_result(bus: &str, reply: &BusReply) {
    let result = match reply.status {
        ReplyStatus::Success => "Success",
        ReplyStatus::Error => "Error",
        ReplyStatus::Busy => "Busy",
    };
    info!("Result: {} {}", bus, result);
}

pub struct I2cConnection {
    endpoint: Endpoint,
}

impl I2cConnection {
    pub fn new(master_address: u32, bus_name: &str, link: Box<dyn BusLink>) -> Result<Self, BusError> {
        let endpoint = Endpoint::attach(link, Protocol::I2c, bus_name, master_address.to_string())?;
        Ok(Self { endpoint })
    }

    fn address(&self) -> Result<u32, BusError> {
        self.endpoint.numeric_target(|t| {
            format!("Error: \"{t}\" is not a valid I2C address. To select an address, use SET SIMNODE.")
        })
    }
}

impl BusConnection for I2cConnection {
    fn bus_type(&self) -> BusType {
        BusType::I2c
    }

    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        let address = self.address()?;
        let reply = self.endpoint.send(Operation::Write { data: data.to_vec() })?;
        expect_success(reply)?;
        info!("Wrote {} bytes to I2C address {}", data.len(), address);
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError> {
        check_length(len)?;
        self.address()?;
        let reply = self.endpoint.send(Operation::Read { len })?;
        log_result("I2C", &reply);
        Ok(fill(&expect_success(reply)?, len))
    }

    fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError> {
        check_length(read_len)?;
        self.address()?;
        let reply = self.endpoint.send(Operation::Transact {
            data: data.to_vec(),
            read_len,
            timeout_ms: None,
        })?;
        Ok(fill(&expect_success(reply)?, read_len))
    }

    fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.endpoint.target = target.to_string();
        Ok(())
    }
}

pub struct CanConnection {
    endpoint: Endpoint,
}

impl CanConnection {
    pub fn new(master_identifier: u32, bus_name: &str, link: Box<dyn BusLink>) -> Result<Self, BusError> {
        let endpoint = Endpoint::attach(link, Protocol::Can, bus_name, master_identifier.to_string())?;
        Ok(Self { endpoint })
    }

    fn identifier(&self) -> Result<u32, BusError> {
        self.endpoint.numeric_target(|t| {
            format!("Error: \"{t}\" is not a valid CAN identifier. To select an identifier, use SET SIMNODE.")
        })
    }
}

impl BusConnection for CanConnection {
    fn bus_type(&self) -> BusType {
        BusType::Can
    }

    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        let identifier = self.identifier()?;
        let reply = self.endpoint.send(Operation::Write { data: data.to_vec() })?;
        expect_success(reply)?;
        info!("Wrote {} bytes to CAN address {}", data.len(), identifier);
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError> {
        check_length(len)?;
        self.identifier()?;
        let reply = self.endpoint.send(Operation::Read { len })?;
        log_result("Can", &reply);
        Ok(fill(&expect_success(reply)?, len))
    }

    fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError> {
        check_length(read_len)?;
        self.identifier()?;
        let reply = self.endpoint.send(Operation::Transact {
            data: data.to_vec(),
            read_len,
            timeout_ms: None,
        })?;
        Ok(fill(&expect_success(reply)?, read_len))
    }

    fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.endpoint.target = target.to_string();
        Ok(())
    }
}

/// SPI master; the target node is the chip-select line.
pub struct SpiConnection {
    endpoint: Endpoint,
}

impl SpiConnection {
    pub fn new(bus_name: &str, link: Box<dyn BusLink>) -> Result<Self, BusError> {
        let endpoint = Endpoint::attach(link, Protocol::Spi, bus_name, "spi-master".to_string())?;
        Ok(Self { endpoint })
    }

    fn select_line(&self) -> Result<u32, BusError> {
        self.endpoint
            .numeric_target(|t| format!("Error: \"{t}\" is not a valid select line. Must be a number."))
    }

    /// Run one operation with the target chip selected.
    fn selected(&mut self, operation: Operation) -> Result<(u32, Vec<u8>), BusError> {
        let line = self.select_line()?;
        expect_success(self.endpoint.send(Operation::SelectChip { line })?)?;
        let result = self.endpoint.send(operation).and_then(expect_success);
        let unselect = self.endpoint.send(Operation::UnselectChip).and_then(expect_success);
        let data = result?;
        unselect?;
        Ok((line, data))
    }
}

impl BusConnection for SpiConnection {
    fn bus_type(&self) -> BusType {
        BusType::Spi
    }

    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        let (line, _) = self.selected(Operation::Write { data: data.to_vec() })?;
        info!("Wrote {} bytes to SPI device {}", data.len(), line);
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError> {
        let (_, data) = self.selected(Operation::Read { len })?;
        Ok(fill(&data, len))
    }

    fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError> {
        let (_, reply) = self.selected(Operation::Transact {
            data: data.to_vec(),
            read_len,
            timeout_ms: None,
        })?;
        Ok(fill(&reply, read_len))
    }

    fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.endpoint.target = target.to_string();
        Ok(())
    }
}

/// UART node; the target node is the port number.
pub struct UartConnection {
    endpoint: Endpoint,
}

impl UartConnection {
    pub fn new(node_name: &str, bus_name: &str, link: Box<dyn BusLink>) -> Result<Self, BusError> {
        let endpoint = Endpoint::attach(link, Protocol::Uart, bus_name, node_name.to_string())?;
        Ok(Self { endpoint })
    }

    fn port(&self) -> Result<u32, BusError> {
        self.endpoint
            .numeric_target(|t| format!("Error: \"{t}\" is not a valid UART port. Must be a number."))
    }

    fn available(&mut self) -> Result<usize, BusError> {
        let data = expect_success(self.endpoint.send(Operation::Available)?)?;
        let count = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .map_or(0, u32::from_be_bytes);
        Ok(count as usize)
    }
}

impl BusConnection for UartConnection {
    fn bus_type(&self) -> BusType {
        BusType::Uart
    }

    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        let port = self.port()?;
        expect_success(self.endpoint.send(Operation::Write { data: data.to_vec() })?)?;
        info!("Wrote {} bytes to UART port {}", data.len(), port);
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<ReadBuffer, BusError> {
        self.port()?;
        let available = self.available()?;
        if available == 0 {
            return Err(BusError::runtime("There are no bytes available to read."));
        }
        let want = len.min(available);
        let data = expect_success(self.endpoint.send(Operation::Read { len: want })?)?;
        Ok(fill(&data, data.len().min(want)))
    }

    fn transact(&mut self, _data: &[u8], _read_len: usize) -> Result<ReadBuffer, BusError> {
        Err(BusError::runtime("Error: Cannot perform transactions on UART bus."))
    }

    fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.endpoint.target = target.to_string();
        Ok(())
    }
}

/// Plain message-passing node used for BASE and COMMAND buses.
pub struct BaseConnection {
    endpoint: Endpoint,
}

impl BaseConnection {
    pub fn new(node_name: &str, bus_name: &str, link: Box<dyn BusLink>) -> Result<Self, BusError> {
        let endpoint = Endpoint::attach(link, Protocol::Base, bus_name, node_name.to_string())?;
        info!("Connected to standard bus {}", bus_name);
        Ok(Self { endpoint })
    }
}

impl BusConnection for BaseConnection {
    fn bus_type(&self) -> BusType {
        BusType::Base
    }

    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        expect_success(self.endpoint.send(Operation::Write { data: data.to_vec() })?)?;
        Ok(())
    }

    fn read(&mut self, _len: usize) -> Result<ReadBuffer, BusError> {
        Err(BusError::runtime("Error: Cannot read from a normal bus."))
    }

    fn transact(&mut self, data: &[u8], read_len: usize) -> Result<ReadBuffer, BusError> {
        self.endpoint
            .send(Operation::Transact {
                data: data.to_vec(),
                read_len,
                timeout_ms: Some(REQUEST_TIMEOUT_MS),
            })
            .and_then(expect_success)
            .map(|reply| fill(&reply, read_len))
            .map_err(|e| {
                debug!("Request message failed: {}", e);
                BusError::runtime(
                    "Error while sending request message. The transaction may have timed out before a response was received.",
                )
            })
    }

    fn set_target(&mut self, target: &str) -> Result<(), BusError> {
        self.endpoint.target = target.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::link::LoopbackLink;

    fn loopback() -> Box<dyn BusLink> {
        Box::new(LoopbackLink::new("test"))
    }

    #[test]
    fn i2c_requires_numeric_target() {
        let mut i2c = I2cConnection::new(42, "i2c_0", loopback()).unwrap();
        i2c.set_target("sensor").unwrap();
        let err = i2c.write(b"x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: \"sensor\" is not a valid I2C address. To select an address, use SET SIMNODE."
        );
    }

    #[test]
    fn i2c_read_rejects_zero_length() {
        let mut i2c = I2cConnection::new(42, "i2c_0", loopback()).unwrap();
        i2c.set_target("64").unwrap();
        assert_eq!(i2c.read(0).unwrap_err().to_string(), LENGTH_MUST_BE_POSITIVE);
    }

    #[test]
    fn i2c_read_pads_to_requested_length() {
        let mut i2c = I2cConnection::new(42, "i2c_0", loopback()).unwrap();
        i2c.set_target("64").unwrap();
        i2c.write(&[0xAB]).unwrap();
        assert_eq!(i2c.read(3).unwrap().as_slice(), &[0xAB, 0, 0]);
    }

    #[test]
    fn spi_transact_round_trips_through_loopback() {
        let mut spi = SpiConnection::new("spi_0", loopback()).unwrap();
        spi.set_target("1").unwrap();
        assert_eq!(spi.transact(&[1, 2], 2).unwrap().as_slice(), &[1, 2]);
    }

    #[test]
    fn uart_read_without_data_fails() {
        let mut uart = UartConnection::new("terminal", "usart_0", loopback()).unwrap();
        uart.set_target("3").unwrap();
        assert_eq!(
            uart.read(4).unwrap_err().to_string(),
            "There are no bytes available to read."
        );
        uart.write(b"ok").unwrap();
        assert_eq!(uart.read(4).unwrap().as_slice(), b"ok");
    }

    #[test]
    fn uart_cannot_transact() {
        let mut uart = UartConnection::new("terminal", "usart_0", loopback()).unwrap();
        assert!(uart.transact(b"a", 1).is_err());
    }

    #[test]
    fn base_cannot_read() {
        let mut base = BaseConnection::new("terminal", "command", loopback()).unwrap();
        assert_eq!(
            base.read(1).unwrap_err().to_string(),
            "Error: Cannot read from a normal bus."
        );
    }

    #[test]
    fn fill_truncates_long_replies() {
        assert_eq!(fill(&[1, 2, 3, 4], 2).as_slice(), &[1, 2]);
        assert_eq!(fill(&[0; 400], 400).len(), MAX_TRANSFER_LEN);
    }
}

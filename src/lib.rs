//! # Simulator Terminal
//!
//! An interactive command terminal for exercising flight-software
//! simulators: typed commands become write, read and transact operations on
//! a simulated I2C, CAN, SPI, UART or command bus.
//!
//! ## Quick Start
//!
//! ```rust
//! use simterm::{LinkConnector, SimTerminal, TerminalConfig};
//!
//! let config = TerminalConfig {
//!     nos_connection_string: "loopback://demo".to_string(),
//!     ..TerminalConfig::default()
//! };
//! let mut terminal = SimTerminal::new(&config, Box::new(LinkConnector));
//! terminal.start(&config.startup_commands);
//!
//! terminal.process_command("SET SIMNODE radio");
//! terminal.process_command("SET HEX");
//! let reply = terminal.process_command("TRANSACT 2 CAFE");
//! assert_eq!(reply, " 0xCA 0xFE\n");
//! ```
//!
//! ## Architecture
//!
//! - [`codec`] - ASCII hex conversion and output rendering
//! - [`session`] - session settings and their enumerations
//! - [`prompt`] - prompt rendering
//! - [`registry`] - named backend connection strings
//! - [`bus`] - bus connections, backend links and the connection manager
//! - [`command`] - command grammar
//! - [`terminal`] - the interpreter that ties it together
//! - [`transport`] - console and UDP front ends
//! - [`config`] - JSON configuration

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::iter_without_into_iter)]

pub mod bus;
pub mod codec;
pub mod command;
pub mod config;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod terminal;
pub mod transport;

// Re-export main public types for convenience
pub use bus::{BusConnection, BusConnectionManager, BusError, ConnectionFactory, ConnectionSpec, LinkConnector};
pub use config::TerminalConfig;
pub use registry::ConnectionRegistry;
pub use session::{BusType, IoMode, PromptStyle, SessionState};
pub use terminal::{SimTerminal, QUIT_SENTINEL};

use crate::bus::{BusConnectionManager, BusError, ConnectionFactory, Diagnostics};
use crate::codec::{decode_payload, render_output};
use crate::command::{Direction, ParseError, TerminalCommand};
use crate::config::TerminalConfig;
use crate::prompt::format_prompt;
use crate::registry::{ConnectionRegistry, DEFAULT_CONNECTION_LABEL};
use crate::session::{BusType, SessionState};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result text that tells a transport to end the session.
pub const QUIT_SENTINEL: &str = "QUIT";

const HELP_TEXT: &str = "\
This is help for the simulator terminal program.
  The prompt shows <terminal node>-<NOS connection name><simulator node being commanded>:(<bus type>)<bus name>:[<mode>]
  Commands:
    HELP - Displays this help
    QUIT - Exits the program
    SET SIMNODE <sim node> - Sets the simulator node being commanded to '<sim node>'
    SET SIMBUS <sim bus> - Sets the simulator bus for the simulator node being commanded to '<sim bus>'
    SET SIMBUSTYPE <BASE|I2C|CAN|SPI|UART|COMMAND> - Sets the type of the simulator bus
    SET TERMNODE <term node> - Sets the name of this terminal's node to '<term node>'
    SET <ASCII|HEX> [IN|OUT] - Sets the terminal mode to ASCII mode or HEX mode; optionally IN or OUT only
    SET PROMPT <LONG|SHORT|NONE> - Sets the style of the prompt
    SUPPRESS OUTPUT <ON|OFF> - Stops or resumes replies to UDP clients
    LIST NOS CONNECTIONS - Lists the known NOS connection names and connection strings
    SET NOS CONNECTION <name> - Switches to the NOS connection named '<name>'
    ADD NOS CONNECTION <name> <connection string> - Adds (or replaces) a named NOS connection
    WRITE <data> - Writes <data> to the current node. Interprets <data> as ascii or hex depending on input setting.
    READ <length> - Reads the given number of bytes from the current node. Only works on SPI and I2C buses.
    TRANSACT <read length> <data> - Performs a transaction. Sends the given data, and expects a return value of the given length.
             Interprets everything after the first space after <read length> as data to be written.";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("\"{0}\" is not a known NOS connection name. Use LIST NOS CONNECTIONS to see the known names.")]
    UnknownConnection(String),
}

/// Command interpreter and owner of one terminal session.
///
/// Every transport feeds lines to [`SimTerminal::process_command`] and
/// shows whatever text comes back.
pub struct SimTerminal {
    state: SessionState,
    registry: ConnectionRegistry,
    bus: BusConnectionManager,
    diagnostics: Diagnostics,
}

impl SimTerminal {
    pub fn new(config: &TerminalConfig, factory: Box<dyn ConnectionFactory>) -> Self {
        let mut registry = ConnectionRegistry::new(config.nos_connection_string.clone());
        for (label, uri) in &config.connections {
            if label != DEFAULT_CONNECTION_LABEL {
                registry.add(label.clone(), uri.clone());
            }
        }

        let state = SessionState {
            bus_type: config
                .bus_type
                .unwrap_or_else(|| BusType::infer_from_bus_name(&config.start_bus)),
            terminal_node_name: config.term_node_name.clone(),
            target_node_name: config.sim_commanded.clone(),
            bus_name: config.start_bus.clone(),
            input_mode: config.input_mode,
            output_mode: config.output_mode,
            prompt_style: config.prompt,
            suppress_output: config.suppress_output,
            active_connection_label: DEFAULT_CONNECTION_LABEL.to_string(),
            connection_string: config.nos_connection_string.clone(),
        };

        Self {
            state,
            registry,
            bus: BusConnectionManager::new(factory),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Make the first connection, then run each startup command.
    ///
    /// Returns the combined output, one entry per line that produced any.
    pub fn start(&mut self, startup_commands: &[String]) -> Vec<String> {
        let mut output = Vec::new();

        let result = self.bus.reset(&mut self.state, &mut self.diagnostics);
        let mut text = self.drain_notes();
        if let Err(e) = result {
            warn!("Initial bus connection failed: {}", e);
            append_line(&mut text, &e.to_string());
        }
        if !text.is_empty() {
            output.push(text);
        }

        for command in startup_commands {
            info!("Running startup command: {}", command);
            let result = self.process_command(command);
            if !result.is_empty() {
                output.push(result);
            }
        }
        output
    }

    /// Run one input line and return the text to show for it.
    pub fn process_command(&mut self, input: &str) -> String {
        debug!("Processing command: {:?}", input);
        let outcome = TerminalCommand::parse(input)
            .map_err(CommandError::from)
            .and_then(|command| match command {
                Some(command) => self.execute(command),
                None => Ok(String::new()),
            });

        let mut text = self.drain_notes();
        match outcome {
            Ok(result) => append_line(&mut text, &result),
            Err(e) => {
                debug!("Command failed: {}", e);
                append_line(&mut text, &e.to_string());
            }
        }
        text
    }

    pub fn prompt(&self) -> String {
        format_prompt(&self.state)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &BusConnectionManager {
        &self.bus
    }

    pub fn suppress_output(&self) -> bool {
        self.state.suppress_output
    }

    fn execute(&mut self, command: TerminalCommand) -> Result<String, CommandError> {
        match command {
            TerminalCommand::Help => Ok(HELP_TEXT.to_string()),
            TerminalCommand::Quit => Ok(QUIT_SENTINEL.to_string()),
            TerminalCommand::SetSimNode(name) => {
                self.state.target_node_name = name;
                if self.bus.is_connected() {
                    self.bus.set_target(&self.state.target_node_name)?;
                }
                Ok(String::new())
            }
            TerminalCommand::SetSimBus(name) => {
                if name == self.state.bus_name {
                    return Ok(format!("Already on bus {name}"));
                }
                self.state.bus_name = name;
                self.reset_bus()
            }
            TerminalCommand::SetSimBusType(bus_type) => {
                self.state.bus_type = bus_type;
                self.reset_bus()
            }
            TerminalCommand::SetTermNode(name) => {
                self.state.terminal_node_name = name;
                self.reset_bus()
            }
            TerminalCommand::SetMode { mode, direction } => {
                if matches!(direction, Direction::Both | Direction::In) {
                    self.state.input_mode = mode;
                }
                if matches!(direction, Direction::Both | Direction::Out) {
                    self.state.output_mode = mode;
                }
                Ok(String::new())
            }
            TerminalCommand::SetPrompt(style) => {
                self.state.prompt_style = style;
                Ok(String::new())
            }
            TerminalCommand::SuppressOutput(on) => {
                self.state.suppress_output = on;
                Ok(String::new())
            }
            TerminalCommand::ListConnections => Ok(self.registry.listing()),
            TerminalCommand::SetConnection(label) => self.switch_connection(label),
            TerminalCommand::AddConnection { label, uri } => {
                self.registry.add(label, uri);
                Ok(String::new())
            }
            TerminalCommand::Write(payload) => {
                let data = decode_payload(&payload, self.state.input_mode);
                self.bus.write(&data)?;
                Ok(String::new())
            }
            TerminalCommand::Read(len) => {
                let data = self.bus.read(len)?;
                Ok(render_output(&data, self.state.output_mode))
            }
            TerminalCommand::Transact { read_len, payload } => {
                let data = decode_payload(&payload, self.state.input_mode);
                let reply = self.bus.transact(&data, read_len)?;
                Ok(render_output(&reply, self.state.output_mode))
            }
        }
    }

    fn reset_bus(&mut self) -> Result<String, CommandError> {
        self.bus.reset(&mut self.state, &mut self.diagnostics)?;
        Ok(String::new())
    }

    /// Switch backends; the label only changes once the new connection is up.
    fn switch_connection(&mut self, label: String) -> Result<String, CommandError> {
        let uri = self
            .registry
            .get(&label)
            .ok_or_else(|| CommandError::UnknownConnection(label.clone()))?
            .to_string();
        if uri == self.state.connection_string {
            return Ok(format!("Already using connection string {uri}"));
        }

        let previous = core::mem::replace(&mut self.state.connection_string, uri);
        match self.bus.reset(&mut self.state, &mut self.diagnostics) {
            Ok(()) => {
                info!("Switched to NOS connection \"{}\"", label);
                self.state.active_connection_label = label;
                Ok(String::new())
            }
            Err(e) => {
                self.state.connection_string = previous;
                if let Err(restore) = self.bus.reset(&mut self.state, &mut self.diagnostics) {
                    self.diagnostics.note(format!(
                        "Could not reconnect to NOS connection \"{}\": {}",
                        self.state.active_connection_label, restore
                    ));
                }
                Err(e.into())
            }
        }
    }

    fn drain_notes(&mut self) -> String {
        self.diagnostics.take().join("\n")
    }
}

fn append_line(text: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
}

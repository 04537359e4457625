//! Terminal command grammar.
//!
//! A line is split on whitespace. Keywords and enumerated values are matched
//! on an upper-cased copy of the tokens; node names, labels, URIs and
//! payloads keep their original case.

use crate::codec::leading_number;
use crate::session::{parse_switch, BusType, IoMode, PromptStyle, SettingError};
use thiserror::Error;

/// Which direction(s) a `SET ASCII` / `SET HEX` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Both,
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    Help,
    Quit,
    SetSimNode(String),
    SetSimBus(String),
    SetSimBusType(BusType),
    SetTermNode(String),
    SetMode { mode: IoMode, direction: Direction },
    SetPrompt(PromptStyle),
    SuppressOutput(bool),
    ListConnections,
    SetConnection(String),
    AddConnection { label: String, uri: String },
    Write(String),
    Read(usize),
    Transact { read_len: usize, payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error("\"{0}\" is not a valid number.")]
    InvalidNumber(String),
    #[error("Unrecognized command \"{0}\". Type \"HELP\" for help.")]
    Unrecognized(String),
}

/// One input line split into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens<'a> {
    line: &'a str,
    raw: Vec<&'a str>,
    upper: Vec<String>,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a str) -> Self {
        let line = line.trim();
        let raw: Vec<&str> = line.split_whitespace().collect();
        let upper = line.split_whitespace().map(str::to_ascii_uppercase).collect();
        Self { line, raw, upper }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn raw(&self, index: usize) -> &'a str {
        self.raw[index]
    }

    /// Text after the first token, trimmed.
    pub fn rest(&self) -> &'a str {
        self.line
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest.trim())
    }

    fn keywords(&self) -> Vec<&str> {
        self.upper.iter().map(String::as_str).collect()
    }
}

impl TerminalCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let tokens = Tokens::new(line);
        if tokens.is_empty() {
            return Ok(None);
        }

        let arg = |i: usize| tokens.raw(i).to_string();
        let command = match tokens.keywords().as_slice() {
            ["HELP"] => TerminalCommand::Help,
            ["QUIT"] => TerminalCommand::Quit,
            ["SET", "SIMNODE", _] => TerminalCommand::SetSimNode(arg(2)),
            ["SET", "SIMBUS", _] => TerminalCommand::SetSimBus(arg(2)),
            ["SET", "SIMBUSTYPE", _] => TerminalCommand::SetSimBusType(tokens.raw(2).parse()?),
            ["SET", "TERMNODE", _] => TerminalCommand::SetTermNode(arg(2)),
            ["SET", mode @ ("ASCII" | "HEX"), direction @ ..] => {
                let direction = match direction {
                    [] => Direction::Both,
                    ["IN"] => Direction::In,
                    ["OUT"] => Direction::Out,
                    _ => return Err(ParseError::Unrecognized(tokens.line.to_string())),
                };
                TerminalCommand::SetMode {
                    mode: mode.parse()?,
                    direction,
                }
            }
            ["SET", "PROMPT", _] => TerminalCommand::SetPrompt(tokens.raw(2).parse()?),
            ["SUPPRESS", "OUTPUT", _] => {
                TerminalCommand::SuppressOutput(parse_switch(tokens.raw(2))?)
            }
            ["LIST", "NOS", "CONNECTIONS"] => TerminalCommand::ListConnections,
            ["SET", "NOS", "CONNECTION", _] => TerminalCommand::SetConnection(arg(3)),
            ["ADD", "NOS", "CONNECTION", _, _] => TerminalCommand::AddConnection {
                label: arg(3),
                uri: arg(4),
            },
            ["WRITE", _, ..] => TerminalCommand::Write(tokens.rest().to_string()),
            // Unparsable lengths read nothing rather than fail.
            ["READ", _] => TerminalCommand::Read(leading_number(tokens.raw(1)).unwrap_or(0)),
            ["TRANSACT", _, _, ..] => {
                let (length, payload) = tokens
                    .rest()
                    .split_once(char::is_whitespace)
                    .unwrap_or((tokens.rest(), ""));
                let read_len = leading_number(length)
                    .ok_or_else(|| ParseError::InvalidNumber(length.to_string()))?;
                TerminalCommand::Transact {
                    read_len,
                    payload: payload.to_string(),
                }
            }
            _ => return Err(ParseError::Unrecognized(tokens.line.to_string())),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> TerminalCommand {
        TerminalCommand::parse(line).unwrap().unwrap()
    }

    #[test]
    fn keywords_are_case_insensitive_but_arguments_are_not() {
        assert_eq!(parse("set simnode MyNode"), TerminalCommand::SetSimNode("MyNode".into()));
        assert_eq!(parse("  Set SimBus Bus_A  "), TerminalCommand::SetSimBus("Bus_A".into()));
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(TerminalCommand::parse("   \t "), Ok(None));
    }

    #[test]
    fn token_count_must_match_exactly() {
        assert!(matches!(
            TerminalCommand::parse("HELP me"),
            Err(ParseError::Unrecognized(_))
        ));
        assert!(matches!(
            TerminalCommand::parse("SET SIMNODE"),
            Err(ParseError::Unrecognized(_))
        ));
        assert!(matches!(
            TerminalCommand::parse("QUITTER"),
            Err(ParseError::Unrecognized(_))
        ));
    }

    #[test]
    fn mode_directions() {
        assert_eq!(
            parse("set hex"),
            TerminalCommand::SetMode { mode: IoMode::Hex, direction: Direction::Both }
        );
        assert_eq!(
            parse("SET ASCII out"),
            TerminalCommand::SetMode { mode: IoMode::Ascii, direction: Direction::Out }
        );
        assert!(TerminalCommand::parse("SET HEX SIDEWAYS").is_err());
    }

    #[test]
    fn invalid_enum_values_are_setting_errors() {
        assert_eq!(
            TerminalCommand::parse("SET SIMBUSTYPE pci"),
            Err(ParseError::Setting(SettingError::BusType("pci".into())))
        );
        assert!(matches!(
            TerminalCommand::parse("SET PROMPT tiny"),
            Err(ParseError::Setting(SettingError::PromptStyle(_)))
        ));
        assert!(matches!(
            TerminalCommand::parse("SUPPRESS OUTPUT maybe"),
            Err(ParseError::Setting(SettingError::Switch(_)))
        ));
    }

    #[test]
    fn write_keeps_payload_text() {
        assert_eq!(parse("write Hello World"), TerminalCommand::Write("Hello World".into()));
    }

    #[test]
    fn read_length_defaults_to_zero() {
        assert_eq!(parse("READ abc"), TerminalCommand::Read(0));
        assert_eq!(parse("READ 12"), TerminalCommand::Read(12));
        assert_eq!(parse("READ -3"), TerminalCommand::Read(0));
        assert_eq!(parse("READ 3x"), TerminalCommand::Read(3));
    }

    #[test]
    fn transact_splits_length_and_payload() {
        assert_eq!(
            parse("TRANSACT 3 48656C6C6F"),
            TerminalCommand::Transact { read_len: 3, payload: "48656C6C6F".into() }
        );
        assert_eq!(
            parse("transact 2 a b"),
            TerminalCommand::Transact { read_len: 2, payload: "a b".into() }
        );
        assert_eq!(
            parse("TRANSACT 2x AB"),
            TerminalCommand::Transact { read_len: 2, payload: "AB".into() }
        );
        assert_eq!(
            TerminalCommand::parse("TRANSACT x 00"),
            Err(ParseError::InvalidNumber("x".into()))
        );
    }

    #[test]
    fn connection_commands_keep_case() {
        assert_eq!(
            parse("add nos connection Lab tcp://10.0.0.1:1234"),
            TerminalCommand::AddConnection {
                label: "Lab".into(),
                uri: "tcp://10.0.0.1:1234".into()
            }
        );
        assert_eq!(parse("SET NOS CONNECTION Lab"), TerminalCommand::SetConnection("Lab".into()));
        assert_eq!(parse("list nos connections"), TerminalCommand::ListConnections);
    }
}

use core::fmt;
use core::str::FromStr;
use serde::Deserialize;
use thiserror::Error;

/// Which simulated bus (or generic channel) the terminal is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum BusType {
    Base,
    I2c,
    Can,
    Spi,
    Uart,
    Command,
}

impl BusType {
    pub const ALL: [BusType; 6] = [
        BusType::Base,
        BusType::I2c,
        BusType::Can,
        BusType::Spi,
        BusType::Uart,
        BusType::Command,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BusType::Base => "BASE",
            BusType::I2c => "I2C",
            BusType::Can => "CAN",
            BusType::Spi => "SPI",
            BusType::Uart => "UART",
            BusType::Command => "COMMAND",
        }
    }

    /// Guess the bus type from a bus name such as `i2c_0` or `usart_1`.
    pub fn infer_from_bus_name(bus_name: &str) -> Self {
        let lower = bus_name.to_ascii_lowercase();
        if lower.contains("i2c") {
            BusType::I2c
        } else if lower.contains("can") {
            BusType::Can
        } else if lower.contains("spi") {
            BusType::Spi
        } else if lower.contains("uart") || lower.contains("usart") {
            BusType::Uart
        } else {
            BusType::Base
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusType {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BusType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SettingError::BusType(s.to_string()))
    }
}

impl TryFrom<String> for BusType {
    type Error = SettingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How command payloads are read and bus results are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum IoMode {
    #[default]
    Ascii,
    Hex,
}

impl IoMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IoMode::Ascii => "ASCII",
            IoMode::Hex => "HEX",
        }
    }
}

impl FromStr for IoMode {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ASCII") {
            Ok(IoMode::Ascii)
        } else if s.eq_ignore_ascii_case("HEX") {
            Ok(IoMode::Hex)
        } else {
            Err(SettingError::IoMode(s.to_string()))
        }
    }
}

impl TryFrom<String> for IoMode {
    type Error = SettingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum PromptStyle {
    #[default]
    Long,
    Short,
    None,
}

impl FromStr for PromptStyle {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LONG" => Ok(PromptStyle::Long),
            "SHORT" => Ok(PromptStyle::Short),
            "NONE" => Ok(PromptStyle::None),
            _ => Err(SettingError::PromptStyle(s.to_string())),
        }
    }
}

impl TryFrom<String> for PromptStyle {
    type Error = SettingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parse an `ON`/`OFF` switch, ignoring case.
pub fn parse_switch(s: &str) -> Result<bool, SettingError> {
    if s.eq_ignore_ascii_case("ON") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("OFF") {
        Ok(false)
    } else {
        Err(SettingError::Switch(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("\"{0}\" is not a valid bus type. Valid bus types are BASE, I2C, CAN, SPI, UART, COMMAND.")]
    BusType(String),
    #[error("\"{0}\" is not a valid mode. Valid modes are ASCII, HEX.")]
    IoMode(String),
    #[error("\"{0}\" is not a valid prompt type. Valid prompt types are LONG, SHORT, NONE.")]
    PromptStyle(String),
    #[error("\"{0}\" is not a valid setting. Use ON or OFF.")]
    Switch(String),
}

/// Mutable settings of one terminal session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub bus_type: BusType,
    /// Identity this terminal presents on the bus (I2C address, CAN id or node name).
    pub terminal_node_name: String,
    /// Simulated node being commanded.
    pub target_node_name: String,
    pub bus_name: String,
    pub input_mode: IoMode,
    pub output_mode: IoMode,
    pub prompt_style: PromptStyle,
    pub suppress_output: bool,
    pub active_connection_label: String,
    /// Backend connection string currently in use.
    pub connection_string: String,
}

impl SessionState {
    /// Human readable I/O mode summary used by the long prompt.
    pub fn mode_string(&self) -> String {
        format!(
            "IN={}:OUT={}",
            self.input_mode.as_str(),
            self.output_mode.as_str()
        )
    }

    /// Compact I/O mode summary used by the short prompt.
    pub fn short_mode_string(&self) -> String {
        let letter = |mode: IoMode| match mode {
            IoMode::Ascii => 'A',
            IoMode::Hex => 'H',
        };
        format!("I={}:O={}", letter(self.input_mode), letter(self.output_mode))
    }
}

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
    OnePointFive,
}

/// Flow control negotiated by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    None,
    XOnXOff,
    RequestToSend,
    RequestToSendXOnXOff,
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Self::None,
            "odd" | "o" => Self::Odd,
            "even" | "e" => Self::Even,
            "mark" | "m" => Self::Mark,
            "space" | "s" => Self::Space,
            _ => return Err(ConfigError::UnknownValue { field: "parity", value: s.to_string() }),
        })
    }
}

impl FromStr for StopBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "1" | "one" => Self::One,
            "2" | "two" => Self::Two,
            "1.5" | "onepointfive" => Self::OnePointFive,
            _ => return Err(ConfigError::UnknownValue { field: "stop bits", value: s.to_string() }),
        })
    }
}

impl FromStr for Handshake {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "xonxoff" | "software" => Self::XOnXOff,
            "rts" | "requesttosend" | "hardware" => Self::RequestToSend,
            "rts-xonxoff" | "requesttosendxonxoff" => Self::RequestToSendXOnXOff,
            _ => return Err(ConfigError::UnknownValue { field: "handshake", value: s.to_string() }),
        })
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Odd => "odd",
            Self::Even => "even",
            Self::Mark => "mark",
            Self::Space => "space",
        })
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::One => "1",
            Self::Two => "2",
            Self::OnePointFive => "1.5",
        })
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::XOnXOff => "xonxoff",
            Self::RequestToSend => "rts",
            Self::RequestToSendXOnXOff => "rts-xonxoff",
        })
    }
}

/// Settings for one serial connection. A channel takes ownership of its
/// configuration and never hands out a mutable reference to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub handshake: Handshake,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            port_name: "COM3".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            handshake: Handshake::None,
        }
    }
}

impl fmt::Display for PortConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} baud, {} data bits, parity {}, stop bits {}, handshake {}",
            self.port_name, self.baud_rate, self.data_bits, self.parity, self.stop_bits, self.handshake
        )
    }
}

/// The subset of a [`PortConfiguration`] the OS driver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
    pub flow_control: serialport::FlowControl,
}

impl PortConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_name.trim().is_empty() {
            return Err(ConfigError::EmptyPortName);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        Ok(())
    }

    /// Maps the configuration onto `serialport` settings. Mark/space parity,
    /// 1.5 stop bits and combined RTS + XON/XOFF have no driver equivalent.
    pub fn driver_settings(&self) -> Result<DriverSettings, ConfigError> {
        self.validate()?;

        let data_bits = match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => return Err(ConfigError::InvalidDataBits(other)),
        };
        let parity = match self.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            other => return Err(ConfigError::UnsupportedParity(other)),
        };
        let stop_bits = match self.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
            other => return Err(ConfigError::UnsupportedStopBits(other)),
        };
        let flow_control = match self.handshake {
            Handshake::None => serialport::FlowControl::None,
            Handshake::XOnXOff => serialport::FlowControl::Software,
            Handshake::RequestToSend => serialport::FlowControl::Hardware,
            other => return Err(ConfigError::UnsupportedHandshake(other)),
        };

        Ok(DriverSettings { data_bits, parity, stop_bits, flow_control })
    }
}

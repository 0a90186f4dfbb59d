use std::io;

use thiserror::Error;

use crate::config::{Handshake, Parity, StopBits};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port name is empty")]
    EmptyPortName,
    #[error("baud rate must be non-zero")]
    ZeroBaudRate,
    #[error("data bits must be between 5 and 8, got {0}")]
    InvalidDataBits(u8),
    #[error("{0} parity is not supported by the serial driver")]
    UnsupportedParity(Parity),
    #[error("{0} stop bits are not supported by the serial driver")]
    UnsupportedStopBits(StopBits),
    #[error("{0} handshake is not supported by the serial driver")]
    UnsupportedHandshake(Handshake),
    #[error("unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: String },
}

/// Failures recorded by a [`SerialChannel`](crate::SerialChannel).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Connection(#[source] io::Error),
    #[error("port is already open")]
    AlreadyOpen,
    #[error("port is not open")]
    NotOpen,
    #[error("{0}")]
    Write(#[source] io::Error),
    #[error("{0}")]
    Read(#[source] io::Error),
}

impl ChannelError {
    /// Whether this failure came from opening the port.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Connection(_) | Self::AlreadyOpen)
    }
}

#[derive(Debug, Error)]
#[error("no failure has been recorded on {port}")]
pub struct PreconditionError {
    pub port: String,
}

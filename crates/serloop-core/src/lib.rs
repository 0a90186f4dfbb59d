//! Core functionalities: port configuration, serial channel, loopback tester.

pub mod config;
pub mod error;
pub mod link;
pub mod channel;
pub mod tester;
pub mod logbuf;
pub mod sim;

pub use config::{PortConfiguration, Parity, StopBits, Handshake, DriverSettings};
pub use error::{ConfigError, ChannelError, PreconditionError};
pub use link::{SerialLink, Connector, SystemConnector, PortInfo, list_ports};
pub use channel::SerialChannel;
pub use tester::{LoopbackTester, Phase, Verdict, TickOutcome, CycleStats, LOOPBACK_PATTERN, buffers_match};
pub use logbuf::{LogSink, LogStore, LogEntry, Level};
pub use sim::{EchoDevice, SimConnector, SimLink, WRITE_HISTORY};

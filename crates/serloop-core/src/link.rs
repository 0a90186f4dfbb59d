use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo};

use crate::config::PortConfiguration;
use crate::error::ChannelError;

/// Read timeout handed to the driver. Reads are only issued once enough
/// bytes are buffered, so this is never actually waited on in practice.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// An open, byte-oriented serial connection.
pub trait SerialLink {
    /// Number of bytes buffered and ready to be read without blocking.
    fn bytes_to_read(&self) -> io::Result<usize>;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

/// Produces a [`SerialLink`] for a configuration.
pub trait Connector {
    type Link: SerialLink;

    fn connect(&self, config: &PortConfiguration) -> Result<Self::Link, ChannelError>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn bytes_to_read(&self) -> io::Result<usize> {
        Ok((**self).bytes_to_read()? as usize)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self, data)?;
        self.flush()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(self, buf)
    }
}

/// Opens real ports through the OS serial driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    type Link = Box<dyn SerialPort>;

    fn connect(&self, config: &PortConfiguration) -> Result<Self::Link, ChannelError> {
        let settings = config.driver_settings()?;
        serialport::new(&config.port_name, config.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(settings.flow_control)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| ChannelError::Connection(e.into()))
    }
}

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, product) = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => ("USB", Some(usb.vid), Some(usb.pid), usb.product),
            serialport::SerialPortType::PciPort => ("PCI", None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth", None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown", None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type: port_type.to_string(),
            vid,
            pid,
            product,
        }
    }
}

pub fn list_ports() -> Vec<PortInfo> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect()
}

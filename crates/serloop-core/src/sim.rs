//! In-memory loopback device for running the tester without hardware.
//!
//! [`EchoDevice`] is a cloneable handle; every clone shares the same state,
//! so a test (or the host's simulate mode) can keep one handle to inject
//! faults while the channel owns the [`SimLink`].

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PortConfiguration;
use crate::error::ChannelError;
use crate::link::{Connector, SerialLink};

/// Number of most recent writes an [`EchoDevice`] keeps for inspection.
pub const WRITE_HISTORY: usize = 64;

#[derive(Debug)]
struct DeviceState {
    present: bool,
    echo: bool,
    inbound: VecDeque<u8>,
    corrupt_next: Option<(usize, u8)>,
    write_failures: usize,
    read_failures: usize,
    writes: VecDeque<Vec<u8>>,
    write_count: u64,
}

#[derive(Debug, Clone)]
pub struct EchoDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl Default for EchoDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoDevice {
    /// A connected device that echoes every write.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                present: true,
                echo: true,
                inbound: VecDeque::new(),
                corrupt_next: None,
                write_failures: 0,
                read_failures: 0,
                writes: VecDeque::new(),
                write_count: 0,
            })),
        }
    }

    /// A device that is not plugged in; opening it fails.
    pub fn absent() -> Self {
        let device = Self::new();
        device.state.lock().present = false;
        device
    }

    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// Queues bytes as if the device had transmitted them.
    pub fn feed(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    /// Replaces the byte at `index` of the next echoed write with `value`.
    pub fn corrupt_next_echo(&self, index: usize, value: u8) {
        self.state.lock().corrupt_next = Some((index, value));
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().write_failures = count;
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().read_failures = count;
    }

    /// Bytes waiting to be read by the host.
    pub fn pending(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// The last [`WRITE_HISTORY`] successful writes, oldest first.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.iter().cloned().collect()
    }

    /// Successful writes since the device was created.
    pub fn write_count(&self) -> u64 {
        self.state.lock().write_count
    }

    pub fn connector(&self) -> SimConnector {
        SimConnector { device: self.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct SimConnector {
    device: EchoDevice,
}

impl Connector for SimConnector {
    type Link = SimLink;

    fn connect(&self, config: &PortConfiguration) -> Result<Self::Link, ChannelError> {
        config.driver_settings()?;
        if !self.device.state.lock().present {
            return Err(ChannelError::Connection(io::Error::new(
                io::ErrorKind::NotFound,
                format!("device on {} is not present", config.port_name),
            )));
        }
        Ok(SimLink { device: self.device.clone() })
    }
}

#[derive(Debug)]
pub struct SimLink {
    device: EchoDevice,
}

impl SerialLink for SimLink {
    fn bytes_to_read(&self) -> io::Result<usize> {
        Ok(self.device.state.lock().inbound.len())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.device.state.lock();
        if state.write_failures > 0 {
            state.write_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated write failure"));
        }
        state.writes.push_back(data.to_vec());
        while state.writes.len() > WRITE_HISTORY {
            state.writes.pop_front();
        }
        state.write_count += 1;
        if state.echo {
            let mut echoed = data.to_vec();
            if let Some((index, value)) = state.corrupt_next.take() {
                if let Some(byte) = echoed.get_mut(index) {
                    *byte = value;
                }
            }
            state.inbound.extend(echoed);
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut state = self.device.state.lock();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "simulated read failure"));
        }
        let wanted = buf.len();
        if state.inbound.len() < wanted {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough buffered bytes"));
        }
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..wanted)) {
            *slot = byte;
        }
        Ok(())
    }
}

use crate::config::PortConfiguration;
use crate::error::{ChannelError, PreconditionError};
use crate::link::{Connector, SerialLink, SystemConnector};

/// A single serial connection plus the outcome of its most recent operation.
///
/// The channel starts closed. `open`, `send` and `receive` clear the recorded
/// failure on entry, so [`last_error`](Self::last_error) only ever describes
/// the latest call.
pub struct SerialChannel<C: Connector = SystemConnector> {
    config: PortConfiguration,
    connector: C,
    link: Option<C::Link>,
    last_error: Option<ChannelError>,
}

impl SerialChannel<SystemConnector> {
    pub fn new(config: PortConfiguration) -> Self {
        Self::with_connector(config, SystemConnector)
    }
}

impl<C: Connector> SerialChannel<C> {
    pub fn with_connector(config: PortConfiguration, connector: C) -> Self {
        Self {
            config,
            connector,
            link: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn open(&mut self) -> Result<(), &ChannelError> {
        self.last_error = None;
        if self.link.is_some() {
            return Err(self.record(ChannelError::AlreadyOpen));
        }
        match self.connector.connect(&self.config) {
            Ok(link) => {
                log::debug!("opened {}", self.config);
                self.link = Some(link);
                Ok(())
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Writes all of `data` or records why it could not.
    pub fn send(&mut self, data: &[u8]) -> Result<(), &ChannelError> {
        self.last_error = None;
        let result = match self.link.as_mut() {
            Some(link) => link.write_all(data).map_err(ChannelError::Write),
            None => Err(ChannelError::NotOpen),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Non-blocking poll. Fills `buf` and returns its length once at least
    /// `buf.len()` bytes are buffered; otherwise returns 0 and consumes nothing.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, &ChannelError> {
        self.last_error = None;
        let result = match self.link.as_mut() {
            Some(link) => read_available(link, buf),
            None => Err(ChannelError::NotOpen),
        };
        match result {
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }

    pub fn last_error(&self) -> Option<&ChannelError> {
        self.last_error.as_ref()
    }

    pub fn last_error_description(&self) -> Result<String, PreconditionError> {
        self.last_error.as_ref().map(ToString::to_string).ok_or_else(|| PreconditionError {
            port: self.config.port_name.clone(),
        })
    }

    pub fn take_last_error(&mut self) -> Option<ChannelError> {
        self.last_error.take()
    }

    /// Releases the OS handle. A closed channel can be reopened.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            log::debug!("closed {}", self.config.port_name);
        }
    }

    fn record(&mut self, err: ChannelError) -> &ChannelError {
        self.last_error.insert(err)
    }
}

fn read_available<L: SerialLink>(link: &mut L, buf: &mut [u8]) -> Result<usize, ChannelError> {
    let available = link.bytes_to_read().map_err(ChannelError::Read)?;
    if available < buf.len() {
        return Ok(0);
    }
    link.read_exact(buf).map_err(ChannelError::Read)?;
    Ok(buf.len())
}

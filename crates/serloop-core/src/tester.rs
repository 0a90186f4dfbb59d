use std::fmt;
use std::time::{Duration, Instant};

use crate::channel::SerialChannel;
use crate::error::ChannelError;
use crate::link::Connector;
use crate::logbuf::LogSink;

/// Bytes sent on every cycle.
pub const LOOPBACK_PATTERN: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sending,
    Receiving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Match => "MATCH",
            Verdict::Mismatch => "DO NOT MATCH",
        })
    }
}

/// What a single [`LoopbackTester::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    SendFailed,
    Waiting,
    ReadFailed,
    Verdict(Verdict),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub matches: u64,
    pub mismatches: u64,
    pub send_failures: u64,
    pub read_failures: u64,
    pub last_round_trip: Option<Duration>,
}

pub fn buffers_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Alternates between sending [`LOOPBACK_PATTERN`] and polling for its echo,
/// one step per host tick.
pub struct LoopbackTester<C: Connector> {
    channel: SerialChannel<C>,
    phase: Phase,
    recv_buf: [u8; LOOPBACK_PATTERN.len()],
    sent_at: Option<Instant>,
    stats: CycleStats,
}

impl<C: Connector> LoopbackTester<C> {
    /// Opens the channel and starts in [`Phase::Sending`]. An open failure is
    /// logged but does not stop the tester; every send will then fail and be
    /// retried on the following tick.
    pub fn start(mut channel: SerialChannel<C>, sink: &mut impl LogSink) -> Self {
        let port = channel.config().port_name.clone();
        if let Err(e) = channel.open() {
            sink.error(&format!("Unable to open {port}: {e}"));
        }
        Self::with_open_channel(channel)
    }

    /// Like [`start`](Self::start) but hands the open failure back instead of
    /// proceeding.
    pub fn start_strict(mut channel: SerialChannel<C>) -> Result<Self, ChannelError> {
        if channel.open().is_err() {
            if let Some(e) = channel.take_last_error() {
                return Err(e);
            }
        }
        Ok(Self::with_open_channel(channel))
    }

    fn with_open_channel(channel: SerialChannel<C>) -> Self {
        Self {
            channel,
            phase: Phase::Sending,
            recv_buf: [0; LOOPBACK_PATTERN.len()],
            sent_at: None,
            stats: CycleStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn channel(&self) -> &SerialChannel<C> {
        &self.channel
    }

    /// Contents of the receive buffer as of the last full read.
    pub fn received(&self) -> &[u8] {
        &self.recv_buf
    }

    pub fn tick(&mut self, sink: &mut impl LogSink) -> TickOutcome {
        match self.phase {
            Phase::Sending => self.send_step(sink),
            Phase::Receiving => self.receive_step(sink),
        }
    }

    fn send_step(&mut self, sink: &mut impl LogSink) -> TickOutcome {
        match self.channel.send(&LOOPBACK_PATTERN) {
            Ok(()) => {
                self.sent_at = Some(Instant::now());
                self.phase = Phase::Receiving;
                TickOutcome::Sent
            }
            Err(e) => {
                sink.error(&format!("Failed to send: {e}"));
                self.stats.send_failures += 1;
                TickOutcome::SendFailed
            }
        }
    }

    fn receive_step(&mut self, sink: &mut impl LogSink) -> TickOutcome {
        match self.channel.receive(&mut self.recv_buf) {
            Ok(n) if n == self.recv_buf.len() => {
                let verdict = if buffers_match(&LOOPBACK_PATTERN, &self.recv_buf) {
                    Verdict::Match
                } else {
                    Verdict::Mismatch
                };
                self.record_verdict(verdict, sink);
                self.phase = Phase::Sending;
                TickOutcome::Verdict(verdict)
            }
            Ok(_) => TickOutcome::Waiting,
            Err(e) => {
                sink.error(&format!("Failed to read: {e}"));
                self.stats.read_failures += 1;
                TickOutcome::ReadFailed
            }
        }
    }

    fn record_verdict(&mut self, verdict: Verdict, sink: &mut impl LogSink) {
        self.stats.cycles += 1;
        self.stats.last_round_trip = self.sent_at.take().map(|t| t.elapsed());
        match verdict {
            Verdict::Match => {
                self.stats.matches += 1;
                sink.info(&format!("Results: {verdict}"));
            }
            Verdict::Mismatch => {
                self.stats.mismatches += 1;
                sink.info(&format!(
                    "Results: {verdict} (sent {}, received {})",
                    hex::encode_upper(LOOPBACK_PATTERN),
                    hex::encode_upper(self.recv_buf)
                ));
            }
        }
    }

    /// Closes the channel and returns the final counters.
    pub fn shutdown(mut self) -> CycleStats {
        self.channel.close();
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortConfiguration;
    use crate::logbuf::LogStore;
    use crate::sim::{EchoDevice, SimConnector};

    fn tester(device: &EchoDevice, log: &mut LogStore) -> LoopbackTester<SimConnector> {
        let channel = SerialChannel::with_connector(PortConfiguration::default(), device.connector());
        LoopbackTester::start(channel, log)
    }

    #[test]
    fn buffers_match_requires_equal_length_and_bytes() {
        assert!(buffers_match(&[], &[]));
        assert!(buffers_match(&LOOPBACK_PATTERN, &LOOPBACK_PATTERN));
        assert!(!buffers_match(&[1, 2, 3], &[1, 2, 4]));
        assert!(!buffers_match(&[1, 2, 3], &[1, 2]));
        assert!(!buffers_match(&[9, 2, 3], &[1, 2, 3]));
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Match.to_string(), "MATCH");
        assert_eq!(Verdict::Mismatch.to_string(), "DO NOT MATCH");
    }

    #[test]
    fn full_cycle_returns_to_sending() {
        let device = EchoDevice::new();
        let mut log = LogStore::new(16);
        let mut t = tester(&device, &mut log);
        assert_eq!(t.phase(), Phase::Sending);

        assert_eq!(t.tick(&mut log), TickOutcome::Sent);
        assert_eq!(t.phase(), Phase::Receiving);
        assert_eq!(t.tick(&mut log), TickOutcome::Verdict(Verdict::Match));
        assert_eq!(t.phase(), Phase::Sending);
        assert_eq!(t.received(), &LOOPBACK_PATTERN);

        let stats = t.stats();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.matches, 1);
        assert!(stats.last_round_trip.is_some());
    }

    #[test]
    fn read_error_keeps_receiving() {
        let device = EchoDevice::new();
        let mut log = LogStore::new(16);
        let mut t = tester(&device, &mut log);

        t.tick(&mut log);
        device.fail_next_reads(1);
        assert_eq!(t.tick(&mut log), TickOutcome::ReadFailed);
        assert_eq!(t.phase(), Phase::Receiving);
        assert!(log.errors().any(|e| e.message.starts_with("Failed to read: ")));

        assert_eq!(t.tick(&mut log), TickOutcome::Verdict(Verdict::Match));
        assert_eq!(t.stats().read_failures, 1);
    }

    #[test]
    fn mismatch_message_shows_both_buffers() {
        let device = EchoDevice::new();
        let mut log = LogStore::new(16);
        let mut t = tester(&device, &mut log);

        device.corrupt_next_echo(0, 0xAB);
        t.tick(&mut log);
        assert_eq!(t.tick(&mut log), TickOutcome::Verdict(Verdict::Mismatch));
        let last = log.entries().last().unwrap();
        assert_eq!(
            last.message,
            "Results: DO NOT MATCH (sent 0102030405060708, received AB02030405060708)"
        );
    }

    #[test]
    fn strict_start_returns_open_error() {
        let device = EchoDevice::absent();
        let channel = SerialChannel::with_connector(PortConfiguration::default(), device.connector());
        let err = LoopbackTester::start_strict(channel).err().unwrap();
        assert!(matches!(err, ChannelError::Connection(_)));
    }

    #[test]
    fn shutdown_closes_channel_and_returns_stats() {
        let device = EchoDevice::new();
        let mut log = LogStore::new(16);
        let mut t = tester(&device, &mut log);
        t.tick(&mut log);
        t.tick(&mut log);
        assert!(t.channel().is_open());

        let stats = t.shutdown();
        assert_eq!(stats.cycles, 1);
    }
}

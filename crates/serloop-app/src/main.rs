use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::select;
use serloop_core::{
    list_ports, Connector, CycleStats, EchoDevice, Handshake, LogStore, LoopbackTester, Parity, PortConfiguration,
    SerialChannel, StopBits, TickOutcome,
};

const TRANSCRIPT_CAPACITY: usize = 10_000;

/// Sends a fixed 8-byte pattern over a serial port and checks that the
/// device on the other end echoes it back.
#[derive(Parser, Debug)]
#[command(name = "serloop", version, about)]
struct Cli {
    /// Serial port to test, e.g. COM3 or /dev/ttyUSB0
    #[arg(short, long, default_value = "COM3")]
    port: String,

    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    #[arg(long, default_value_t = 8)]
    data_bits: u8,

    /// none, odd, even, mark or space
    #[arg(long, default_value = "none")]
    parity: Parity,

    /// 1, 2 or 1.5
    #[arg(long, default_value = "1")]
    stop_bits: StopBits,

    /// none, xonxoff, rts or rts-xonxoff
    #[arg(long, default_value = "none")]
    handshake: Handshake,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 20)]
    interval_ms: u64,

    /// Stop after this many completed send/receive cycles
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    cycles: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// List available serial ports and exit
    #[arg(long)]
    list: bool,

    /// Run against an in-memory echo device instead of a real port
    #[arg(long)]
    simulate: bool,

    /// Exit with an error if the port cannot be opened
    #[arg(long)]
    strict_open: bool,

    /// Print the timestamped log transcript on exit
    #[arg(long)]
    transcript: bool,
}

impl Cli {
    fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            port_name: self.port.clone(),
            baud_rate: self.baud,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            handshake: self.handshake,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list {
        print_ports();
        return Ok(());
    }

    let config = cli.port_configuration();
    config.validate()?;

    let mut log_store = LogStore::new(TRANSCRIPT_CAPACITY).forwarding();
    let stats = if cli.simulate {
        let device = EchoDevice::new();
        run(&cli, SerialChannel::with_connector(config, device.connector()), &mut log_store)?
    } else {
        run(&cli, SerialChannel::new(config), &mut log_store)?
    };

    log::info!("{}", summary(&stats));
    if cli.transcript {
        print!("{}", log_store.to_text(true));
    }
    Ok(())
}

fn run<C: Connector>(cli: &Cli, channel: SerialChannel<C>, log_store: &mut LogStore) -> Result<CycleStats> {
    log::info!("testing {}", channel.config());

    let mut tester = if cli.strict_open {
        let port = channel.config().port_name.clone();
        LoopbackTester::start_strict(channel).with_context(|| format!("unable to open {port}"))?
    } else {
        LoopbackTester::start(channel, log_store)
    };

    let ticker = crossbeam_channel::tick(Duration::from_millis(cli.interval_ms.max(1)));
    let deadline = match cli.duration_secs {
        Some(secs) => crossbeam_channel::after(Duration::from_secs(secs)),
        None => crossbeam_channel::never(),
    };

    loop {
        select! {
            recv(ticker) -> _ => {
                if let TickOutcome::Verdict(_) = tester.tick(log_store) {
                    if cli.cycles.is_some_and(|n| tester.stats().cycles >= n) {
                        break;
                    }
                }
            }
            recv(deadline) -> _ => break,
        }
    }

    Ok(tester.shutdown())
}

fn summary(stats: &CycleStats) -> String {
    let mut text = format!(
        "{} cycles: {} matched, {} mismatched, {} send failures, {} read failures",
        stats.cycles, stats.matches, stats.mismatches, stats.send_failures, stats.read_failures
    );
    if let Some(rtt) = stats.last_round_trip {
        text.push_str(&format!(", last round trip {} us", rtt.as_micros()));
    }
    text
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("no serial ports found");
        return;
    }
    for p in ports {
        match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => println!("{} ({:04X}:{:04X}) {}", p.port_name, vid, pid, p.product.unwrap_or_default()),
            _ => println!("{} [{}]", p.port_name, p.port_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_com3_at_9600() {
        let cli = Cli::try_parse_from(["serloop"]).unwrap();
        assert_eq!(cli.port_configuration(), PortConfiguration::default());
        assert_eq!(cli.interval_ms, 20);
        assert!(!cli.simulate);
    }

    #[test]
    fn parses_line_settings() {
        let cli = Cli::try_parse_from([
            "serloop", "--port", "/dev/ttyACM0", "--baud", "115200", "--parity", "even", "--stop-bits", "2",
            "--handshake", "rts",
        ])
        .unwrap();
        let cfg = cli.port_configuration();
        assert_eq!(cfg.port_name, "/dev/ttyACM0");
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.parity, Parity::Even);
        assert_eq!(cfg.stop_bits, StopBits::Two);
        assert_eq!(cfg.handshake, Handshake::RequestToSend);
    }

    #[test]
    fn rejects_zero_cycles() {
        assert!(Cli::try_parse_from(["serloop", "--cycles", "0"]).is_err());
        let cli = Cli::try_parse_from(["serloop", "--cycles", "1"]).unwrap();
        assert_eq!(cli.cycles, Some(1));
    }

    #[test]
    fn simulated_run_rejects_mark_parity_like_a_real_port() {
        let cli = Cli::try_parse_from(["serloop", "--simulate", "--strict-open", "--parity", "mark"]).unwrap();
        let device = EchoDevice::new();
        let channel = SerialChannel::with_connector(cli.port_configuration(), device.connector());
        let mut log_store = LogStore::new(8);

        assert!(run(&cli, channel, &mut log_store).is_err());
        assert_eq!(device.write_count(), 0);
    }

    #[test]
    fn rejects_unknown_parity() {
        assert!(Cli::try_parse_from(["serloop", "--parity", "sideways"]).is_err());
    }

    #[test]
    fn simulated_run_stops_after_requested_cycles() {
        let cli = Cli::try_parse_from(["serloop", "--simulate", "--interval-ms", "1", "--cycles", "3"]).unwrap();
        let device = EchoDevice::new();
        let channel = SerialChannel::with_connector(cli.port_configuration(), device.connector());
        let mut log_store = LogStore::new(64);

        let stats = run(&cli, channel, &mut log_store).unwrap();
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.matches, 3);
        assert_eq!(device.writes().len(), 3);
        assert!(summary(&stats).starts_with("3 cycles: 3 matched"));
    }

    #[test]
    fn strict_open_fails_fast_on_absent_device() {
        let cli = Cli::try_parse_from(["serloop", "--strict-open", "--cycles", "1"]).unwrap();
        let device = EchoDevice::absent();
        let channel = SerialChannel::with_connector(cli.port_configuration(), device.connector());
        let mut log_store = LogStore::new(8);

        let err = run(&cli, channel, &mut log_store).unwrap_err();
        assert!(err.to_string().contains("unable to open COM3"));
    }

    #[test]
    fn duration_limit_ends_a_run_that_never_completes() {
        let cli = Cli::try_parse_from(["serloop", "--interval-ms", "1", "--duration-secs", "1"]).unwrap();
        let device = EchoDevice::absent();
        let channel = SerialChannel::with_connector(cli.port_configuration(), device.connector());
        let mut log_store = LogStore::new(4096);

        let stats = run(&cli, channel, &mut log_store).unwrap();
        assert_eq!(stats.cycles, 0);
        assert!(stats.send_failures > 0);
    }
}

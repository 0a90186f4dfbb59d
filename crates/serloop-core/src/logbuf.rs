use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Destination for the tester's formatted diagnostics.
pub trait LogSink {
    fn info(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: u64,
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Bounded transcript of log lines, optionally mirrored to the `log` facade.
pub struct LogStore {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    forward: bool,
}

impl LogStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            forward: false,
        }
    }

    /// Also emit every entry through `log::info!` / `log::error!`.
    pub fn forwarding(mut self) -> Self {
        self.forward = true;
        self
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        let message = message.into();
        if self.forward {
            match level {
                Level::Info => log::info!("{message}"),
                Level::Error => log::error!("{message}"),
            }
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        self.entries.push_back(LogEntry { timestamp, level, message });

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.level == Level::Error)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Renders one line per entry. Timestamps are UTC wall-clock time,
    /// marked with a trailing `Z`.
    pub fn to_text(&self, show_timestamp: bool) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            if show_timestamp {
                let millis = entry.timestamp % 1000;
                let total_secs = entry.timestamp / 1000;
                let hours = (total_secs / 3600) % 24;
                let minutes = (total_secs / 60) % 60;
                let seconds = total_secs % 60;
                result.push_str(&format!("[{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z] "));
            }
            result.push_str(match entry.level {
                Level::Info => "INFO: ",
                Level::Error => "ERROR: ",
            });
            result.push_str(&entry.message);
            result.push('\n');
        }
        result
    }
}

impl LogSink for LogStore {
    fn info(&mut self, message: &str) {
        self.push(Level::Info, message);
    }

    fn error(&mut self, message: &str) {
        self.push(Level::Error, message);
    }
}

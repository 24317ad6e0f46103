//! Output observers and the logging capability used by the runner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info};

/// Stream a line of container output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line of container output, as read from the pipe.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub timestamp: DateTime<Utc>,
    pub stream: OutputStream,
    /// Line text including its terminator, if there was one
    pub raw: String,
}

impl OutputLine {
    pub fn new(stream: OutputStream, raw: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            raw: raw.into(),
        }
    }

    /// Line text without the trailing `\n` / `\r\n`.
    pub fn text(&self) -> &str {
        self.raw.trim_end_matches(['\n', '\r'])
    }
}

/// Observer invoked once per output line, in emission order.
///
/// Runs on the thread draining the child's output, so a handler that
/// blocks stalls the container process.
pub trait LineHandler: Send + Sync {
    fn handle(&self, line: &str);
}

impl<F> LineHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn handle(&self, line: &str) {
        self(line)
    }
}

/// Shareable line handler, used where the handler must outlive the caller's
/// stack frame.
pub type SharedLineHandler = Arc<dyn LineHandler>;

/// Log severity as seen by a [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

/// Destination for the runner's log messages.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Forwards runner messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}

/// Records every message in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, oldest first.
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().clone()
    }

    /// Messages recorded at exactly `level`.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

use crate::dispatcher::Transport;
use crate::domain::{LogRecord, Severity};
use parking_lot::RwLock;
use tracing::Level;

/// Writes records through the process `tracing` subscriber.
///
/// The nine severities collapse onto tracing's five levels; the original
/// severity is kept in the `severity` field.
pub struct ConsoleTransport {
    level: RwLock<Option<Severity>>,
}

impl ConsoleTransport {
    pub fn new(level: Option<Severity>) -> Self {
        Self {
            level: RwLock::new(level),
        }
    }

    pub fn set_level(&self, level: Option<Severity>) {
        *self.level.write() = level;
    }
}

macro_rules! console_event {
    ($level:expr, $record:ident, $data:ident) => {
        tracing::event!(
            target: "rask_log_dispatch::console",
            $level,
            severity = %$record.level,
            data = $data,
            error = %$record.error.message,
            stack = $record.error.stack.as_deref(),
            "{}",
            $record.message
        )
    };
}

impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn level(&self) -> Option<Severity> {
        *self.level.read()
    }

    fn emit(&self, record: &LogRecord) {
        let data = record
            .data
            .as_ref()
            .and_then(|data| serde_json::to_string(data).ok());
        let data = data.as_deref();

        match Level::from(record.level) {
            Level::ERROR => console_event!(Level::ERROR, record, data),
            Level::WARN => console_event!(Level::WARN, record, data),
            Level::INFO => console_event!(Level::INFO, record, data),
            Level::DEBUG => console_event!(Level::DEBUG, record, data),
            _ => console_event!(Level::TRACE, record, data),
        }
    }
}

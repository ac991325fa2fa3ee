//! The log dispatcher.
//!
//! [`Logger`] owns the transport registry and the pending buffer. Each log
//! call is turned into a [`LogRecord`] and fanned out to every registered
//! transport whose current level admits the record's severity. Records logged
//! before the first transport registers are buffered and flushed to it, in
//! order, exactly once.

mod panic_hook;
mod stack;
mod transport;

pub use transport::Transport;

use crate::config::{Environment, LoggerConfig};
use crate::domain::{LogArg, LogMessage, LogRecord, LoggedError, Payload, Severity};
use crate::sanitizer::Sanitizer;
use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Called with the exit code once the fatal grace period has elapsed.
pub type Terminator = Arc<dyn Fn(i32) + Send + Sync>;

const DEFAULT_FATAL_GRACE: Duration = Duration::from_secs(2);

#[derive(Default)]
struct DispatchState {
    transports: Vec<Arc<dyn Transport>>,
    pending: Vec<Arc<LogRecord>>,
    /// Set while the first transport drains the pending buffer. The transport
    /// is only published once the buffer is empty, so records logged in the
    /// meantime queue behind the flushed ones.
    flushing: bool,
}

struct Shared {
    state: Mutex<DispatchState>,
    flushed: Condvar,
    sanitizer: Sanitizer,
    environment: Environment,
    fatal_grace: Duration,
    terminator: Terminator,
    termination_scheduled: AtomicBool,
}

/// Process-wide log dispatcher. Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
}

pub struct LoggerBuilder {
    sensitive_keys: Vec<String>,
    environment: Environment,
    fatal_grace: Duration,
    terminator: Option<Terminator>,
    panic_hook: bool,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            sensitive_keys: Vec::new(),
            environment: Environment::default(),
            fatal_grace: DEFAULT_FATAL_GRACE,
            terminator: None,
            panic_hook: false,
        }
    }
}

impl LoggerBuilder {
    #[must_use]
    pub fn sensitive_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn fatal_grace(mut self, grace: Duration) -> Self {
        self.fatal_grace = grace;
        self
    }

    /// Replaces `std::process::exit` as the action taken after a fatal log.
    #[must_use]
    pub fn terminator(mut self, terminator: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.terminator = Some(Arc::new(terminator));
        self
    }

    /// Routes unhandled panics to this logger once it is built.
    #[must_use]
    pub fn panic_hook(mut self, install: bool) -> Self {
        self.panic_hook = install;
        self
    }

    pub fn build(self) -> Logger {
        let terminator = self
            .terminator
            .unwrap_or_else(|| {
                Arc::new(|code: i32| {
                    std::process::exit(code);
                })
            });

        let logger = Logger {
            shared: Arc::new(Shared {
                state: Mutex::new(DispatchState::default()),
                flushed: Condvar::new(),
                sanitizer: Sanitizer::new(&self.sensitive_keys),
                environment: self.environment,
                fatal_grace: self.fatal_grace,
                terminator,
                termination_scheduled: AtomicBool::new(false),
            }),
        };

        if self.panic_hook {
            logger.install_panic_hook();
        }

        logger
    }
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Production constructor: applies the config and installs the panic hook.
    pub fn new(config: &LoggerConfig) -> Self {
        let logger = Self::builder()
            .sensitive_keys(config.sensitive_keys.iter().cloned())
            .environment(config.environment)
            .fatal_grace(Duration::from_millis(config.fatal_grace_ms))
            .panic_hook(true)
            .build();

        logger.debug(
            format!("[Logger] Environment configured as {}", config.environment),
            &[],
        );
        logger
    }

    /// Routes otherwise-unhandled panics to this logger at ERROR.
    pub fn install_panic_hook(&self) {
        panic_hook::install(self);
    }

    pub fn environment(&self) -> Environment {
        self.shared.environment
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.shared.sanitizer
    }

    pub fn transport_count(&self) -> usize {
        self.shared.state.lock().transports.len()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Adds a transport to the registry.
    ///
    /// A transport that reports no level at registration time is disabled for
    /// this environment and is not added (returns `false`). The first
    /// transport to register receives the pending buffer, in order, before
    /// any record logged after it.
    pub fn register_transport(&self, transport: Arc<dyn Transport>) -> bool {
        if transport.level().is_none() {
            tracing::debug!(transport = transport.name(), "Transport disabled, skipping registration");
            return false;
        }

        let mut state = self.shared.state.lock();
        while state.flushing {
            self.shared.flushed.wait(&mut state);
        }

        if !state.transports.is_empty() {
            state.transports.push(transport.clone());
            drop(state);
            tracing::debug!(transport = transport.name(), flushed = 0, "Transport registered");
            return true;
        }

        // Registry stays empty while flushing, so dispatch keeps buffering.
        state.flushing = true;
        let mut flushed = 0;
        loop {
            let batch = std::mem::take(&mut state.pending);
            if batch.is_empty() {
                state.transports.push(transport.clone());
                state.flushing = false;
                break;
            }
            flushed += batch.len();
            MutexGuard::unlocked(&mut state, || {
                deliver(std::slice::from_ref(&transport), &batch);
            });
        }
        drop(state);
        self.shared.flushed.notify_all();

        tracing::debug!(transport = transport.name(), flushed, "Transport registered");
        true
    }

    /// Builds a record from the call arguments and dispatches it.
    pub fn log(&self, level: Severity, message: impl Into<LogMessage>, data: &[LogArg]) {
        let record = Arc::new(self.build_record(level, message.into(), data));
        self.dispatch(record);
    }

    fn dispatch(&self, record: Arc<LogRecord>) {
        let transports = {
            let mut state = self.shared.state.lock();
            if state.transports.is_empty() {
                state.pending.push(record);
                return;
            }
            state.transports.clone()
        };

        deliver(&transports, std::slice::from_ref(&record));
    }

    fn build_record(&self, level: Severity, message: LogMessage, data: &[LogArg]) -> LogRecord {
        LogRecord {
            level,
            message: message.text(),
            error: resolve_error(&message, data),
            data: self.merge_data(&message, data),
            timestamp: Utc::now(),
        }
    }

    /// Merges every data mapping (and the response bodies of any exceptions,
    /// the message's own last) into one sanitized map.
    fn merge_data(&self, message: &LogMessage, data: &[LogArg]) -> Option<serde_json::Map<String, Value>> {
        let merged = Payload::object();
        let trailing = match message {
            LogMessage::Exception(exception) => Some(LogArg::Exception(exception.clone())),
            _ => None,
        };

        for arg in data.iter().chain(trailing.as_ref()) {
            let source = match arg {
                LogArg::Data(payload) => payload.clone(),
                LogArg::Exception(exception) => exception.response_body(),
                LogArg::Error(_) => continue,
            };
            for (key, value) in source.entries().unwrap_or_default() {
                merged.insert(key, value);
            }
        }

        match self.shared.sanitizer.sanitize(&merged) {
            Value::Object(map) if !map.is_empty() => Some(map),
            _ => None,
        }
    }

    pub fn fatal(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Fatal, message, data);
        self.schedule_termination();
    }

    pub fn critical(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Critical, message, data);
    }

    pub fn error(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Error, message, data);
    }

    pub fn warning(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Warning, message, data);
    }

    pub fn notice(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Notice, message, data);
    }

    pub fn info(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Info, message, data);
    }

    pub fn http(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Http, message, data);
    }

    pub fn debug(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Debug, message, data);
    }

    pub fn trace(&self, message: impl Into<LogMessage>, data: &[LogArg]) {
        self.log(Severity::Trace, message, data);
    }

    /// Exits the process with code 1 once the grace period has passed, giving
    /// asynchronous transports time to finish. Only the first call schedules.
    fn schedule_termination(&self) {
        if self.shared.termination_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let grace = self.shared.fatal_grace;
        let terminator = self.shared.terminator.clone();

        // A plain thread still fires if the async runtime is torn down first.
        let spawned = std::thread::Builder::new()
            .name("fatal-exit".to_string())
            .spawn(move || {
                std::thread::sleep(grace);
                terminator(1);
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to schedule fatal exit, exiting now: {}", e);
            (self.shared.terminator)(1);
        }
    }

    /// Closes every transport, waiting for their in-flight deliveries.
    ///
    /// Records still pending because no transport ever registered are written
    /// to the `tracing` subscriber instead of being dropped.
    pub async fn shutdown(&self) {
        let (transports, pending) = {
            let mut state = self.shared.state.lock();
            (state.transports.clone(), std::mem::take(&mut state.pending))
        };

        for record in &pending {
            tracing::warn!(
                level = %record.level,
                "Undelivered log record at shutdown: {}",
                record.message
            );
        }

        futures::future::join_all(transports.iter().map(|transport| transport.close())).await;
        tracing::debug!(transports = transports.len(), "Logger shut down");
    }
}

/// Delivers `records` in order to each transport in order, polling every
/// transport's level once for the batch.
fn deliver(transports: &[Arc<dyn Transport>], records: &[Arc<LogRecord>]) {
    if records.is_empty() {
        return;
    }
    for transport in transports {
        let Some(threshold) = transport.level() else {
            continue;
        };
        for record in records {
            if record.level.passes(threshold) {
                transport.emit(record);
            }
        }
    }
}

/// The message itself when it is an error, else the first error among the
/// data arguments, else one synthesized from the message text.
fn resolve_error(message: &LogMessage, data: &[LogArg]) -> LoggedError {
    match message {
        LogMessage::Error(error) => return LoggedError::from_error(error),
        LogMessage::Exception(exception) => return LoggedError::from_exception(exception),
        LogMessage::Text(_) => {}
    }

    data.iter()
        .find_map(|arg| match arg {
            LogArg::Error(error) => Some(LoggedError::from_error(error)),
            LogArg::Exception(exception) => Some(LoggedError::from_exception(exception)),
            LogArg::Data(_) => None,
        })
        .unwrap_or_else(|| LoggedError::synthesized(&message.text(), stack::caller_stack()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use serde_json::json;

    fn logger() -> Logger {
        Logger::builder().sensitive_keys(["password"]).build()
    }

    #[test]
    fn test_records_buffer_until_first_transport() {
        let logger = logger();
        logger.info("one", &[]);
        logger.warning("two", &[]);
        assert_eq!(logger.pending_count(), 2);

        let memory = Arc::new(MemoryTransport::new(Some(Severity::Trace)));
        assert!(logger.register_transport(memory.clone()));

        assert_eq!(logger.pending_count(), 0);
        assert_eq!(memory.messages(), vec!["one", "two"]);
    }

    #[test]
    fn test_disabled_transport_is_not_registered() {
        let logger = logger();
        let disabled = Arc::new(MemoryTransport::new(None));
        assert!(!logger.register_transport(disabled));
        assert_eq!(logger.transport_count(), 0);

        logger.info("kept", &[]);
        assert_eq!(logger.pending_count(), 1);
    }

    #[test]
    fn test_data_arguments_are_merged_and_sanitized() {
        let logger = logger();
        let memory = Arc::new(MemoryTransport::new(Some(Severity::Trace)));
        logger.register_transport(memory.clone());

        logger.info(
            "login",
            &[
                LogArg::from(json!({"user": "alice", "password": "hunter2"})),
                LogArg::error(std::io::Error::other("ignored in data")),
                LogArg::from(json!({"attempt": 2})),
            ],
        );

        let record = memory.last().unwrap();
        assert_eq!(
            record.data,
            json!({"user": "alice", "password": "[filtered]", "attempt": 2})
                .as_object()
                .cloned()
        );
        assert_eq!(record.error.message, "ignored in data");
    }

    #[test]
    fn test_empty_data_is_absent() {
        let logger = logger();
        let memory = Arc::new(MemoryTransport::new(Some(Severity::Trace)));
        logger.register_transport(memory.clone());

        logger.info("nothing", &[LogArg::from(json!({})), LogArg::data(Payload::from(5))]);
        assert!(memory.last().unwrap().data.is_none());
    }

    #[test]
    fn test_error_synthesized_from_text() {
        let logger = logger();
        let memory = Arc::new(MemoryTransport::new(Some(Severity::Trace)));
        logger.register_transport(memory.clone());

        logger.notice("plain text", &[]);
        let record = memory.last().unwrap();
        assert_eq!(record.error.message, "plain text");
        assert!(record.error.source.is_none());
    }

    #[test]
    fn test_error_message_becomes_record_error() {
        let logger = logger();
        let memory = Arc::new(MemoryTransport::new(Some(Severity::Trace)));
        logger.register_transport(memory.clone());

        logger.error(LogMessage::error(std::io::Error::other("broken pipe")), &[]);
        let record = memory.last().unwrap();
        assert_eq!(record.message, "broken pipe");
        assert!(record.error.source.is_some());
    }

    #[test]
    fn test_fatal_schedules_termination_once() {
        let (tx, rx) = std::sync::mpsc::channel();
        let logger = Logger::builder()
            .fatal_grace(Duration::from_millis(10))
            .terminator(move |code| {
                let _ = tx.send(code);
            })
            .build();

        logger.fatal("going down", &[]);
        logger.fatal("still going down", &[]);

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(1));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(logger.pending_count(), 2);
    }
}

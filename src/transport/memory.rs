use crate::dispatcher::Transport;
use crate::domain::{LogRecord, Severity};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Keeps every record it receives. Useful in tests and for in-process inspection.
pub struct MemoryTransport {
    name: String,
    level: RwLock<Option<Severity>>,
    records: Mutex<Vec<Arc<LogRecord>>>,
}

impl MemoryTransport {
    pub fn new(level: Option<Severity>) -> Self {
        Self::named("memory", level)
    }

    pub fn named(name: impl Into<String>, level: Option<Severity>) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(level),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn set_level(&self, level: Option<Severity>) {
        *self.level.write() = level;
    }

    pub fn records(&self) -> Vec<Arc<LogRecord>> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.message.clone())
            .collect()
    }

    pub fn last(&self) -> Option<Arc<LogRecord>> {
        self.records.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Option<Severity> {
        *self.level.read()
    }

    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(Arc::new(record.clone()));
    }
}

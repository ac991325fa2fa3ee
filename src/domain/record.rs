use super::payload::Payload;
use super::severity::Severity;
use crate::exception::AppException;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// The error attached to every record.
///
/// Built from the caller's error when one was supplied, otherwise synthesized
/// from the message text with a stack that starts at the caller.
#[derive(Clone, Serialize)]
pub struct LoggedError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip)]
    pub source: Option<SharedError>,
}

impl LoggedError {
    pub fn from_error(error: &SharedError) -> Self {
        Self {
            kind: "Error".to_string(),
            message: error.to_string(),
            causes: cause_chain(error.as_ref()),
            stack: None,
            source: Some(error.clone()),
        }
    }

    pub fn from_exception(exception: &AppException) -> Self {
        Self {
            kind: exception.kind().to_string(),
            message: exception.to_string(),
            causes: cause_chain(exception),
            stack: None,
            source: Some(Arc::new(exception.clone())),
        }
    }

    pub fn synthesized(message: &str, stack: Option<String>) -> Self {
        Self {
            kind: "Error".to_string(),
            message: message.to_string(),
            causes: Vec::new(),
            stack,
            source: None,
        }
    }
}

impl fmt::Debug for LoggedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggedError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("causes", &self.causes)
            .field("has_stack", &self.stack.is_some())
            .finish()
    }
}

fn cause_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}

/// One normalized log event. Created once per log call and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: Severity,
    pub message: String,
    pub error: LoggedError,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Looks up a top-level key of the sanitized data.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }
}

/// The leading argument of a log call.
#[derive(Debug, Clone)]
pub enum LogMessage {
    Text(String),
    Error(SharedError),
    Exception(AppException),
}

impl LogMessage {
    pub fn error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        LogMessage::Error(Arc::new(error))
    }

    pub fn text(&self) -> String {
        match self {
            LogMessage::Text(text) => text.clone(),
            LogMessage::Error(error) => error.to_string(),
            LogMessage::Exception(exception) => exception.to_string(),
        }
    }
}

impl From<&str> for LogMessage {
    fn from(value: &str) -> Self {
        LogMessage::Text(value.to_string())
    }
}

impl From<String> for LogMessage {
    fn from(value: String) -> Self {
        LogMessage::Text(value)
    }
}

impl From<&String> for LogMessage {
    fn from(value: &String) -> Self {
        LogMessage::Text(value.clone())
    }
}

impl From<AppException> for LogMessage {
    fn from(value: AppException) -> Self {
        LogMessage::Exception(value)
    }
}

impl From<SharedError> for LogMessage {
    fn from(value: SharedError) -> Self {
        LogMessage::Error(value)
    }
}

/// A trailing argument of a log call: structured data or an error, in any order.
#[derive(Debug, Clone)]
pub enum LogArg {
    /// A mapping merged into the record data. Non-object payloads are ignored.
    Data(Payload),
    Error(SharedError),
    Exception(AppException),
}

impl LogArg {
    pub fn data(value: impl Into<Payload>) -> Self {
        LogArg::Data(value.into())
    }

    pub fn error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        LogArg::Error(Arc::new(error))
    }
}

impl From<Payload> for LogArg {
    fn from(value: Payload) -> Self {
        LogArg::Data(value)
    }
}

impl From<Value> for LogArg {
    fn from(value: Value) -> Self {
        LogArg::Data(Payload::from(value))
    }
}

impl From<AppException> for LogArg {
    fn from(value: AppException) -> Self {
        LogArg::Exception(value)
    }
}

impl From<SharedError> for LogArg {
    fn from(value: SharedError) -> Self {
        LogArg::Error(value)
    }
}

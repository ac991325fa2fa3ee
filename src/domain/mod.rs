//! Domain layer for rask-log-dispatch.
//!
//! Contains the canonical types shared across all modules:
//! - `Severity`: the nine-step severity scale (FATAL … TRACE)
//! - `Payload`: structured data that may contain reference cycles
//! - `LogRecord`: the normalized record handed to transports
//! - `DispatchError`: top-level error type

pub mod error;
pub mod payload;
pub mod record;
pub mod severity;

pub use error::DispatchError;
pub use payload::Payload;
pub use record::{LogArg, LogMessage, LogRecord, LoggedError, SharedError};
pub use severity::{ParseSeverityError, Severity};

#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Durations in milliseconds fit in u64
    clippy::cast_precision_loss,      // Acceptable for elapsed-seconds display
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. SlackConfig in config module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

//! Leveled log dispatch for services.
//!
//! ```text
//! log call ──► Logger ──► Sanitizer ──► Transport (console, slack, ...)
//!                ▲
//!   ExceptionBoundary / RetryExecutor
//! ```
//!
//! Records produced before any transport exists are buffered and flushed to
//! the first transport that registers.

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod exception;
pub mod retry;
pub mod sanitizer;
pub mod telemetry;
pub mod transport;

// Re-export main types for easy access
pub use config::{Environment, LoggerConfig};
pub use dispatcher::{Logger, LoggerBuilder, Transport};
pub use domain::{LogArg, LogMessage, LogRecord, LoggedError, Payload, Severity};
pub use exception::{AppException, ExceptionBoundary, ExceptionInfo};
pub use retry::{RetryExecutor, RetryParams, RetryStrategy};
pub use sanitizer::Sanitizer;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

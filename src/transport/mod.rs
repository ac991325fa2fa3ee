//! Built-in transports.
//!
//! - `ConsoleTransport`: bridges records into the `tracing` subscriber
//! - `SlackTransport`: posts records to an incoming webhook
//! - `MemoryTransport`: keeps records in memory for inspection

pub mod console;
pub mod memory;
pub mod slack;

pub use console::ConsoleTransport;
pub use memory::MemoryTransport;
pub use slack::SlackTransport;

use crate::config::LoggerConfig;
use crate::dispatcher::Logger;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request timeout: {0}")]
    RequestTimeout(String),
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Registers the console and Slack transports configured for the active
/// environment. Transports that resolve to no level are skipped by the
/// registry. Returns the number of transports actually registered.
pub fn register_defaults(logger: &Logger, config: &LoggerConfig) -> Result<usize, TransportError> {
    let console = ConsoleTransport::new(config.console_level());
    let slack = SlackTransport::new(&config.slack, config.environment)?;

    let registered = [
        logger.register_transport(Arc::new(console)),
        logger.register_transport(Arc::new(slack)),
    ]
    .into_iter()
    .filter(|added| *added)
    .count();

    tracing::info!(
        environment = %config.environment,
        registered,
        "Default transports configured"
    );
    Ok(registered)
}

use thiserror::Error;

/// Top-level error type for the dispatch pipeline.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::InitializationError),
}

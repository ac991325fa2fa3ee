//! Process-wide `tracing` subscriber setup.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Invalid directive format '{input}'. Expected: 'target=level'")]
    InvalidDirectiveFormat { input: String },

    #[error("Logging initialization failed: {details}")]
    LoggingInitFailed {
        details: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `RUST_LOG_FORMAT=json` selects JSON output; anything else is compact.
    pub fn from_env() -> Self {
        match std::env::var("RUST_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

const NOISY_TARGETS: [&str; 5] = ["hyper", "hyper_util", "reqwest", "h2", "tower"];

pub struct TracingSetup {
    default_level: LevelFilter,
    directives: Vec<String>,
    format: LogFormat,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::INFO,
            directives: NOISY_TARGETS.iter().map(|target| format!("{target}=warn")).collect(),
            format: LogFormat::from_env(),
        }
    }
}

impl TracingSetup {
    pub fn new(default_level: LevelFilter) -> Self {
        Self {
            default_level,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn add_directive(&mut self, directive: &str) -> Result<(), InitializationError> {
        let valid = directive
            .split_once('=')
            .is_some_and(|(target, level)| !target.trim().is_empty() && level.trim().parse::<LevelFilter>().is_ok());
        if !valid {
            return Err(InitializationError::InvalidDirectiveFormat {
                input: directive.to_string(),
            });
        }
        self.directives.push(directive.trim().to_string());
        Ok(())
    }

    pub fn build_filter_string(&self) -> String {
        std::iter::once(self.default_level.to_string().to_lowercase())
            .chain(self.directives.iter().cloned())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Installs the global subscriber. `RUST_LOG`, when set, replaces the
    /// built filter. Only the first call in a process does anything; later
    /// calls report whether that one succeeded.
    pub fn init(&self) -> Result<(), InitializationError> {
        static INIT: Once = Once::new();
        static INIT_SUCCESS: AtomicBool = AtomicBool::new(false);

        let mut outcome = None;
        INIT.call_once(|| {
            let result = self.install();
            INIT_SUCCESS.store(result.is_ok(), Ordering::SeqCst);
            outcome = Some(result);
        });

        match outcome {
            Some(result) => result,
            None if INIT_SUCCESS.load(Ordering::SeqCst) => Ok(()),
            None => Err(InitializationError::LoggingInitFailed {
                details: "an earlier initialization attempt failed".to_string(),
                source: Box::new(std::io::Error::other("tracing not installed")),
            }),
        }
    }

    fn install(&self) -> Result<(), InitializationError> {
        let filter_string = self.build_filter_string();
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&filter_string).map_err(|e| {
                InitializationError::LoggingInitFailed {
                    details: format!("Failed to create EnvFilter with '{filter_string}'"),
                    source: Box::new(e),
                }
            })?,
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match self.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().flatten_event(true).with_current_span(true))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().with_target(true).compact())
                .try_init(),
        };

        result.map_err(|e| InitializationError::LoggingInitFailed {
            details: "Failed to set global tracing subscriber".to_string(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_string_includes_noisy_targets() {
        let setup = TracingSetup::new(LevelFilter::DEBUG);
        let filter = setup.build_filter_string();
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_add_directive_validates() {
        let mut setup = TracingSetup::new(LevelFilter::INFO);
        assert!(setup.add_directive("rask_log_dispatch=trace").is_ok());
        assert!(setup.add_directive("no-level").is_err());
        assert!(setup.add_directive("=debug").is_err());
        assert!(setup.build_filter_string().ends_with("rask_log_dispatch=trace"));
    }
}

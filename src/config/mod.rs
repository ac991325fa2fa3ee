mod env;
mod validation;

use crate::domain::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use env::{load_env_list, load_env_string_opt, load_env_var};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

/// Deployment environment. Drives transport defaults and public error redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::EnvError(format!(
                "Invalid environment: {other}. Valid values: local, development, staging, production"
            ))),
        }
    }
}

/// How a transport's threshold is chosen.
///
/// Written as a string in files and env vars: `"off"`/`"none"` disables the
/// transport, `"default"` defers to the environment, anything else must be
/// a severity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LevelSetting {
    #[default]
    EnvironmentDefault,
    Disabled,
    Fixed(Severity),
}

impl LevelSetting {
    pub fn resolve(self, environment_default: Option<Severity>) -> Option<Severity> {
        match self {
            LevelSetting::EnvironmentDefault => environment_default,
            LevelSetting::Disabled => None,
            LevelSetting::Fixed(level) => Some(level),
        }
    }
}

impl FromStr for LevelSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(LevelSetting::EnvironmentDefault),
            "off" | "none" | "null" => Ok(LevelSetting::Disabled),
            other => other
                .parse::<Severity>()
                .map(LevelSetting::Fixed)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string())),
        }
    }
}

impl TryFrom<String> for LevelSetting {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LevelSetting> for String {
    fn from(value: LevelSetting) -> Self {
        match value {
            LevelSetting::EnvironmentDefault => "default".to_string(),
            LevelSetting::Disabled => "off".to_string(),
            LevelSetting::Fixed(level) => level.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub level: LevelSetting,
}

impl ConsoleConfig {
    pub fn resolve_level(&self, environment: Environment) -> Option<Severity> {
        let default = match environment {
            Environment::Local => Severity::Trace,
            Environment::Development | Environment::Staging => Severity::Debug,
            Environment::Production => Severity::Info,
        };
        self.level.resolve(Some(default))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub webhook: Option<String>,
    pub channel: Option<String>,
    pub username: Option<String>,
    pub icon_url: Option<String>,
    pub level: LevelSetting,
    pub timeout_ms: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook: None,
            channel: None,
            username: None,
            icon_url: None,
            level: LevelSetting::EnvironmentDefault,
            timeout_ms: 5000,
        }
    }
}

impl SlackConfig {
    /// Without a webhook there is nowhere to post, so the transport is disabled.
    pub fn resolve_level(&self, environment: Environment) -> Option<Severity> {
        self.webhook.as_ref()?;
        let default = match environment {
            Environment::Local => None,
            Environment::Development | Environment::Staging | Environment::Production => {
                Some(Severity::Warning)
            }
        };
        self.level.resolve(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Statuses logged at ERROR with the inbound request attached.
    pub http_errors: Vec<u16>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            http_errors: vec![500],
        }
    }
}

pub const DEFAULT_SENSITIVE_KEYS: [&str; 13] = [
    "authorization",
    "password",
    "passwd",
    "secret",
    "token",
    "apikey",
    "authtoken",
    "accesstoken",
    "refreshtoken",
    "clientsecret",
    "cookie",
    "setcookie",
    "privatekey",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub environment: Environment,
    pub sensitive_keys: Vec<String>,
    pub fatal_grace_ms: u64,
    pub console: ConsoleConfig,
    pub slack: SlackConfig,
    pub boundary: BoundaryConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(ToString::to_string).collect(),
            fatal_grace_ms: 2000,
            console: ConsoleConfig::default(),
            slack: SlackConfig::default(),
            boundary: BoundaryConfig::default(),
        }
    }
}

impl LoggerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = LoggerConfig::default();

        // NODE_ENV wins over APP_ENV when both are set
        if let Some(value) = ["NODE_ENV", "APP_ENV"]
            .iter()
            .find_map(|name| std::env::var(name).ok())
        {
            config.environment = value.parse()?;
        }

        load_env_list("LOGGER_SENSITIVE_KEYS", &mut config.sensitive_keys)?;
        load_env_var("LOGGER_FATAL_GRACE_MS", &mut config.fatal_grace_ms)?;
        load_env_var("CONSOLE_LEVEL", &mut config.console.level)?;

        load_env_string_opt("SLACK_WEBHOOK", &mut config.slack.webhook);
        load_env_string_opt("SLACK_CHANNEL", &mut config.slack.channel);
        load_env_string_opt("SLACK_USERNAME", &mut config.slack.username);
        load_env_string_opt("SLACK_ICON_URL", &mut config.slack.icon_url);
        load_env_var("SLACK_LEVEL", &mut config.slack.level)?;
        load_env_var("SLACK_TIMEOUT_MS", &mut config.slack.timeout_ms)?;

        load_env_list("APP_HTTP_ERRORS", &mut config.boundary.http_errors)?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoggerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn console_level(&self) -> Option<Severity> {
        self.console.resolve_level(self.environment)
    }

    pub fn slack_level(&self) -> Option<Severity> {
        self.slack.resolve_level(self.environment)
    }
}

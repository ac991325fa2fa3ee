use super::{ConfigError, LoggerConfig};
use crate::sanitizer::normalize_key;
use url::Url;

impl LoggerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in &self.sensitive_keys {
            if normalize_key(key).is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "Sensitive key '{key}' has no alphabetic characters"
                )));
            }
        }

        if let Some(webhook) = &self.slack.webhook {
            Url::parse(webhook).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid Slack webhook URL '{webhook}': {e}"))
            })?;
        }

        if let Some(icon_url) = &self.slack.icon_url {
            Url::parse(icon_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid Slack icon URL '{icon_url}': {e}"))
            })?;
        }

        for (field, value) in [("channel", &self.slack.channel), ("username", &self.slack.username)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Slack {field} must not be empty when set"
                )));
            }
        }

        if self.slack.timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Slack timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(code) = self
            .boundary
            .http_errors
            .iter()
            .find(|code| !(400..=599).contains(*code))
        {
            return Err(ConfigError::InvalidConfig(format!(
                "HTTP error status {code} is not a 4xx or 5xx code"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LoggerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_webhook() {
        let mut config = LoggerConfig::default();
        config.slack.webhook = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_rejects_non_error_status() {
        let mut config = LoggerConfig::default();
        config.boundary.http_errors = vec![500, 204];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_punctuation_only_key() {
        let mut config = LoggerConfig::default();
        config.sensitive_keys.push("--".to_string());
        assert!(config.validate().is_err());
    }
}

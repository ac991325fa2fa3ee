use super::TransportError;
use crate::config::{Environment, SlackConfig};
use crate::dispatcher::Transport;
use crate::domain::{LogRecord, Severity};
use parking_lot::RwLock;
use reqwest::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use url::Url;

const COLOR_DANGER: &str = "#d50200";
const COLOR_WARNING: &str = "#de9e31";
const COLOR_NEUTRAL: &str = "#9e9e9e";

/// Posts records to a Slack incoming webhook.
///
/// Delivery is spawned onto the ambient Tokio runtime and tracked, so
/// [`Transport::close`] can wait for posts still in flight. Failures are
/// reported through `tracing` only; they never re-enter the dispatcher.
pub struct SlackTransport {
    client: Client,
    webhook: Option<Url>,
    channel: Option<String>,
    username: Option<String>,
    icon_url: Option<String>,
    environment: Environment,
    host: Option<String>,
    level: RwLock<Option<Severity>>,
    timeout: Duration,
    tracker: TaskTracker,
}

impl SlackTransport {
    pub fn new(config: &SlackConfig, environment: Environment) -> Result<Self, TransportError> {
        let webhook = config
            .webhook
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| TransportError::InvalidConfiguration(format!("Invalid webhook URL: {e}")))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("rask-log-dispatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TransportError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok());

        Ok(Self {
            client,
            webhook,
            channel: config.channel.clone(),
            username: config.username.clone(),
            icon_url: config.icon_url.clone(),
            environment,
            host,
            level: RwLock::new(config.resolve_level(environment)),
            timeout,
            tracker: TaskTracker::new(),
        })
    }

    pub fn set_level(&self, level: Option<Severity>) {
        *self.level.write() = level;
    }

    /// Number of webhook posts that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn build_message(&self, record: &LogRecord) -> Value {
        let mut fields = Vec::new();
        if let Some(data) = &record.data {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_default();
            fields.push(json!({ "title": "data", "value": format!("```{pretty}```") }));
        }
        if record.error.source.is_some() || record.error.stack.is_some() {
            let mut value = format!("{}: {}", record.error.kind, record.error.message);
            if let Some(stack) = &record.error.stack {
                value = format!("{value}\n```{stack}```");
            }
            fields.push(json!({ "title": "error", "value": value }));
        }

        let mut attachment = json!({
            "color": color_for(record.level),
            "title": format!("{} | {}", record.level, self.environment),
            "text": record.message,
            "fields": fields,
            "ts": record.timestamp.timestamp(),
        });
        if let (Some(host), Some(object)) = (&self.host, attachment.as_object_mut()) {
            object.insert("footer".to_string(), json!(host));
        }

        let mut message = Map::new();
        for (key, value) in [
            ("channel", &self.channel),
            ("username", &self.username),
            ("icon_url", &self.icon_url),
        ] {
            if let Some(value) = value {
                message.insert(key.to_string(), json!(value));
            }
        }
        message.insert("text".to_string(), json!(record.message));
        message.insert("attachments".to_string(), json!([attachment]));
        Value::Object(message)
    }

    /// Posts one record and waits for Slack's answer.
    pub async fn post(&self, record: &LogRecord) -> Result<(), TransportError> {
        let webhook = self
            .webhook
            .clone()
            .ok_or_else(|| TransportError::InvalidConfiguration("No webhook configured".to_string()))?;
        send(self.client.clone(), webhook, self.build_message(record), self.timeout).await
    }
}

async fn send(client: Client, webhook: Url, body: Value, limit: Duration) -> Result<(), TransportError> {
    let response = timeout(limit, client.post(webhook).json(&body).send())
        .await
        .map_err(|_| TransportError::RequestTimeout("Slack webhook timeout".to_string()))??;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response.text().await.unwrap_or_default();
    Err(TransportError::HttpError {
        status: status.as_u16(),
        message,
    })
}

fn color_for(level: Severity) -> &'static str {
    match level {
        Severity::Fatal | Severity::Critical | Severity::Error => COLOR_DANGER,
        Severity::Warning => COLOR_WARNING,
        _ => COLOR_NEUTRAL,
    }
}

impl Transport for SlackTransport {
    fn name(&self) -> &str {
        "slack"
    }

    fn level(&self) -> Option<Severity> {
        if self.webhook.is_none() {
            return None;
        }
        *self.level.read()
    }

    fn emit(&self, record: &LogRecord) {
        let Some(webhook) = self.webhook.clone() else {
            return;
        };

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(
                level = %record.level,
                "No async runtime available, Slack delivery skipped: {}",
                record.message
            );
            return;
        };

        let body = self.build_message(record);
        let client = self.client.clone();
        let limit = self.timeout;
        self.tracker.spawn_on(
            async move {
                if let Err(e) = send(client, webhook, body, limit).await {
                    tracing::warn!("Slack delivery failed: {}", e);
                }
            },
            &handle,
        );
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.tracker.close();
            if timeout(self.timeout, self.tracker.wait()).await.is_err() {
                tracing::warn!(
                    in_flight = self.tracker.len(),
                    "Timed out waiting for Slack deliveries"
                );
            }
        })
    }
}

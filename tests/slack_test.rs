use chrono::Utc;
use rask_log_dispatch::config::SlackConfig;
use rask_log_dispatch::transport::{SlackTransport, TransportError};
use rask_log_dispatch::{Environment, LogRecord, LoggedError, Logger, Severity};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> SlackConfig {
    SlackConfig {
        webhook: Some(format!("{}/hook", server.uri())),
        channel: Some("#alerts".to_string()),
        timeout_ms: 1000,
        ..SlackConfig::default()
    }
}

fn record(level: Severity, message: &str) -> LogRecord {
    LogRecord {
        level,
        message: message.to_string(),
        error: LoggedError::synthesized(message, None),
        data: None,
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn test_post_sends_formatted_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "channel": "#alerts",
            "text": "queue is stuck",
            "attachments": [{"title": "WARNING | production"}]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = SlackTransport::new(&config(&server), Environment::Production).unwrap();
    transport.post(&record(Severity::Warning, "queue is stuck")).await.unwrap();
}

#[tokio::test]
async fn test_post_reports_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid_token"))
        .mount(&server)
        .await;

    let transport = SlackTransport::new(&config(&server), Environment::Production).unwrap();
    let result = transport.post(&record(Severity::Error, "boom")).await;

    match result {
        Err(TransportError::HttpError { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "invalid_token");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_dispatch_respects_threshold_and_shutdown_waits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let logger = Logger::builder().environment(Environment::Production).build();
    let transport = Arc::new(SlackTransport::new(&config(&server), Environment::Production).unwrap());
    assert!(logger.register_transport(transport.clone()));

    logger.info("not alert-worthy", &[]);
    logger.warning("disk at 90%", &[]);
    logger.critical("disk full", &[]);

    logger.shutdown().await;
    assert_eq!(transport.in_flight(), 0);
}

#[tokio::test]
async fn test_disabled_without_webhook() {
    let logger = Logger::builder().environment(Environment::Production).build();
    let transport = Arc::new(SlackTransport::new(&SlackConfig::default(), Environment::Production).unwrap());
    assert!(!logger.register_transport(transport));
}

#[test]
fn test_invalid_webhook_is_rejected() {
    let config = SlackConfig {
        webhook: Some("not a url".to_string()),
        ..SlackConfig::default()
    };
    assert!(matches!(
        SlackTransport::new(&config, Environment::Production),
        Err(TransportError::InvalidConfiguration(_))
    ));
}

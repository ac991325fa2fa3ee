use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use rask_log_dispatch::exception::{
    BoundaryResponse, RequestContext, UpstreamResponse, normalize, to_public_body,
};
use rask_log_dispatch::transport::MemoryTransport;
use rask_log_dispatch::{
    AppException, Environment, ExceptionBoundary, Logger, LoggerConfig, Payload, Severity,
};
use serde_json::{Value, json};
use std::sync::Arc;

#[test]
fn test_validation_constraints_from_message_array() {
    let exception = AppException::http(StatusCode::BAD_REQUEST, "Bad Request").with_details(
        Payload::from(json!({"message": ["name is required", "age must be positive"]})),
    );
    let info = normalize(&exception);

    assert_eq!(info.message, "request validation failed");
    assert_eq!(
        Value::Object(info.details),
        json!({"constraints": ["name is required", "age must be positive"]})
    );
}

#[test]
fn test_production_internal_error_body() {
    let exception = AppException::http(StatusCode::INTERNAL_SERVER_ERROR, "secret stack detail")
        .with_details(Payload::from(json!({"table": "users"})));
    let body = to_public_body(&normalize(&exception), true);

    assert_eq!(body, json!({"code": 500, "message": "unexpected error"}));
    assert!(body.get("details").is_none());
    assert!(body.get("table").is_none());
}

#[test]
fn test_proxy_passthrough_body() {
    let upstream = UpstreamResponse {
        status: Some(404),
        data: Payload::from(json!({"foo": 1})),
    };
    let exception = AppException::upstream(StatusCode::NOT_FOUND, upstream, true);
    let info = normalize(&exception);

    assert_eq!(info.details["proxyResponse"], json!(true));
    assert_eq!(to_public_body(&info, false), json!({"foo": 1}));
}

#[test]
fn test_proxy_without_data_relays_null() {
    let exception = AppException::upstream(StatusCode::BAD_GATEWAY, UpstreamResponse::default(), true);
    assert_eq!(to_public_body(&normalize(&exception), false), Value::Null);
}

#[test]
fn test_status_defaults_to_internal_error() {
    let exception = AppException::from_error(std::fmt::Error);
    assert_eq!(normalize(&exception).error_code, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_boundary_response_is_json() {
    let response = BoundaryResponse {
        status: StatusCode::CONFLICT,
        body: json!({"code": 409, "message": "already exists"}),
    }
    .into_response();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"code": 409, "message": "already exists"}));
}

#[test]
fn test_configured_http_errors_control_severity() {
    let mut config = LoggerConfig {
        environment: Environment::Staging,
        ..LoggerConfig::default()
    };
    config.boundary.http_errors = vec![500, 502];

    let logger = Logger::builder().environment(config.environment).build();
    let memory = Arc::new(MemoryTransport::new(Some(Severity::Trace)));
    logger.register_transport(memory.clone());
    let boundary = ExceptionBoundary::new(logger, &config);

    let request = RequestContext::new("/proxy/items?limit=10");
    boundary.handle(&AppException::http(StatusCode::BAD_GATEWAY, "upstream down"), &request);
    boundary.handle(&AppException::http(StatusCode::NOT_FOUND, "no such item"), &request);

    let records = memory.records();
    assert_eq!(records[0].level, Severity::Error);
    assert_eq!(records[0].field("inboundRequest").unwrap()["url"], "/proxy/items");
    assert_eq!(records[1].level, Severity::Info);
    assert!(records[1].field("inboundRequest").is_none());
}

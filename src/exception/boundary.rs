use super::{AppException, ExceptionInfo, normalize, to_public_body};
use crate::config::{Environment, LoggerConfig};
use crate::dispatcher::Logger;
use crate::domain::{LogArg, Payload};
use axum::Json;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// What the boundary knows about the request that failed.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub url: String,
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub body: Value,
    pub headers: Map<String, Value>,
    pub metadata: Option<Value>,
}

impl RequestContext {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let query = url
            .split_once('?')
            .map(|(_, query)| parse_query(query))
            .unwrap_or_default();
        Self {
            url,
            query,
            ..Self::default()
        }
    }

    /// Captures url, query string and headers from an axum request head.
    /// Header values that are not valid UTF-8 are skipped.
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), json!(value)))
            })
            .collect();

        Self {
            url: parts.uri.to_string(),
            query: parts.uri.query().map(parse_query).unwrap_or_default(),
            headers,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Map<String, Value>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The request as logged alongside server faults: path without the query
    /// string, and only the parts that carry something.
    pub fn to_log_value(&self) -> Value {
        let path = self.url.split('?').next().unwrap_or_default();
        let mut out = Map::new();
        out.insert("url".to_string(), json!(path));

        let parts = [
            ("params", Value::Object(self.params.clone())),
            ("query", Value::Object(self.query.clone())),
            ("body", self.body.clone()),
            ("headers", Value::Object(self.headers.clone())),
        ];
        for (key, value) in parts {
            if !is_blank(&value) {
                out.insert(key.to_string(), value);
            }
        }
        if let Some(metadata) = &self.metadata {
            out.insert("metadata".to_string(), metadata.clone());
        }
        Value::Object(out)
    }
}

fn parse_query(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Status plus JSON body produced for a failed request.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for BoundaryResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Turns exceptions raised while serving a request into responses, logging
/// each one on the way out.
///
/// Statuses listed in `http_errors` are logged at ERROR with the inbound
/// request attached; everything else is logged at INFO without it.
#[derive(Clone)]
pub struct ExceptionBoundary {
    logger: Logger,
    environment: Environment,
    http_errors: HashSet<u16>,
}

impl ExceptionBoundary {
    pub fn new(logger: Logger, config: &LoggerConfig) -> Self {
        Self {
            logger,
            environment: config.environment,
            http_errors: config.boundary.http_errors.iter().copied().collect(),
        }
    }

    pub fn handle(&self, exception: &AppException, request: &RequestContext) -> BoundaryResponse {
        let info = normalize(exception);
        self.log_exception(exception, &info, request);

        let production_internal_error = self.environment.is_production()
            && info.error_code == StatusCode::INTERNAL_SERVER_ERROR;

        BoundaryResponse {
            status: info.error_code,
            body: to_public_body(&info, production_internal_error),
        }
    }

    fn log_exception(&self, exception: &AppException, info: &ExceptionInfo, request: &RequestContext) {
        let data = Payload::object().with("message", info.message.as_str());
        for (key, value) in &info.details {
            data.insert(key.clone(), value.clone());
        }

        if self.http_errors.contains(&info.error_code.as_u16()) {
            data.insert("inboundRequest", request.to_log_value());
            self.logger.error(exception.clone(), &[LogArg::Data(data)]);
        } else {
            self.logger.info(exception.clone(), &[LogArg::Data(data)]);
        }
    }
}

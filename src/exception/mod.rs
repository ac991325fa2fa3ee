//! Exception normalization.
//!
//! Every failure that reaches the request boundary is an [`AppException`].
//! [`normalize`] turns it into an [`ExceptionInfo`] (status, message,
//! details) and [`to_public_body`] decides what the caller gets to see.

mod boundary;

pub use boundary::{BoundaryResponse, ExceptionBoundary, RequestContext};

use crate::domain::{Payload, SharedError};
use crate::sanitizer::decycle;
use axum::http::StatusCode;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;

pub const VALIDATION_FAILED_MESSAGE: &str = "request validation failed";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "unexpected error";

/// Fields of an exception body that are internal and never exposed in details.
const INTERNAL_FIELDS: [&str; 3] = ["statusCode", "message", "error"];

/// The response an upstream system returned for a call made on a client's behalf.
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: Option<u16>,
    pub data: Payload,
}

impl UpstreamResponse {
    fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(status) = self.status {
            out.insert("status".to_string(), json!(status));
        }
        if !self.data.is_undefined() {
            out.insert("data".to_string(), decycle(&self.data));
        }
        Value::Object(out)
    }
}

#[derive(Error, Debug, Clone)]
pub enum AppException {
    /// Client input failed validation; each entry is one constraint message.
    #[error("{}", .constraints.join("; "))]
    Validation { constraints: Vec<String> },

    /// An upstream call failed. With `proxy_response` set, the upstream
    /// payload is relayed to the caller verbatim.
    #[error("{}", .message.as_deref().unwrap_or("upstream request failed"))]
    UpstreamProxy {
        status: StatusCode,
        message: Option<String>,
        upstream: UpstreamResponse,
        proxy_response: bool,
        details: Payload,
    },

    /// Any other failure, with the status it should surface as.
    #[error("{}", .message.as_deref().unwrap_or(UNEXPECTED_ERROR_MESSAGE))]
    Internal {
        status: StatusCode,
        message: Option<String>,
        details: Payload,
        #[source]
        source: Option<SharedError>,
    },
}

impl AppException {
    pub fn validation<I, S>(constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AppException::Validation {
            constraints: constraints.into_iter().map(Into::into).collect(),
        }
    }

    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        AppException::Internal {
            status,
            message: Some(message.into()),
            details: Payload::Undefined,
            source: None,
        }
    }

    /// Wraps an arbitrary error as a 500.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AppException::Internal {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some(error.to_string()),
            details: Payload::Undefined,
            source: Some(Arc::new(error)),
        }
    }

    pub fn upstream(status: StatusCode, upstream: UpstreamResponse, proxy_response: bool) -> Self {
        AppException::UpstreamProxy {
            status,
            message: None,
            upstream,
            proxy_response,
            details: Payload::Undefined,
        }
    }

    /// Attaches a structured body to a non-validation exception.
    #[must_use]
    pub fn with_details(mut self, body: Payload) -> Self {
        match &mut self {
            AppException::UpstreamProxy { details, .. } | AppException::Internal { details, .. } => {
                *details = body;
            }
            AppException::Validation { .. } => {}
        }
        self
    }

    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            AppException::UpstreamProxy { message, .. } | AppException::Internal { message, .. } => {
                *message = Some(text.into());
            }
            AppException::Validation { .. } => {}
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppException::Validation { .. } => StatusCode::BAD_REQUEST,
            AppException::UpstreamProxy { status, .. } | AppException::Internal { status, .. } => *status,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppException::Validation { .. } => "ValidationException",
            AppException::UpstreamProxy { .. } => "UpstreamException",
            AppException::Internal { .. } => "HttpException",
        }
    }

    /// The structured body as it would appear in logs.
    pub fn response_body(&self) -> Payload {
        Payload::from(Value::Object(normalize(self).details))
    }
}

/// Uniform view of an exception.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub error_code: StatusCode,
    pub message: String,
    pub details: Map<String, Value>,
}

impl ExceptionInfo {
    pub fn is_proxy_response(&self) -> bool {
        self.details.get("proxyResponse") == Some(&Value::Bool(true))
    }
}

pub fn normalize(exception: &AppException) -> ExceptionInfo {
    match exception {
        AppException::Validation { constraints } => validation_info(constraints.clone()),

        AppException::Internal {
            status,
            message,
            details,
            ..
        } => {
            let body = decycle(details);
            if *status == StatusCode::BAD_REQUEST {
                return validation_info(constraints_from(message.as_deref(), &body));
            }
            ExceptionInfo {
                error_code: *status,
                message: pick_message(message.as_deref(), &body),
                details: strip_internal(body),
            }
        }

        AppException::UpstreamProxy {
            status,
            message,
            upstream,
            proxy_response,
            details,
        } => {
            let body = decycle(details);
            let message = pick_message(message.as_deref(), &body);
            let mut details = strip_internal(body);
            details.insert("upstreamResponse".to_string(), upstream.to_json());
            if *proxy_response {
                details.insert("proxyResponse".to_string(), Value::Bool(true));
            }
            ExceptionInfo {
                error_code: *status,
                message,
                details,
            }
        }
    }
}

/// The JSON body returned to the caller.
///
/// A proxied upstream failure is relayed verbatim. Otherwise the body is
/// `{code, message, ...details}`, collapsed to `{code, message: "unexpected
/// error"}` when `production_internal_error` is set.
pub fn to_public_body(info: &ExceptionInfo, production_internal_error: bool) -> Value {
    if info.is_proxy_response() {
        return info
            .details
            .get("upstreamResponse")
            .and_then(|upstream| upstream.get("data"))
            .cloned()
            .unwrap_or(Value::Null);
    }

    let mut body = Map::new();
    body.insert("code".to_string(), json!(info.error_code.as_u16()));
    if production_internal_error {
        body.insert("message".to_string(), json!(UNEXPECTED_ERROR_MESSAGE));
        return Value::Object(body);
    }

    body.insert("message".to_string(), json!(info.message));
    for (key, value) in &info.details {
        body.insert(key.clone(), value.clone());
    }
    Value::Object(body)
}

fn validation_info(constraints: Vec<String>) -> ExceptionInfo {
    let mut details = Map::new();
    details.insert("constraints".to_string(), json!(constraints));
    ExceptionInfo {
        error_code: StatusCode::BAD_REQUEST,
        message: VALIDATION_FAILED_MESSAGE.to_string(),
        details,
    }
}

/// A validation body may carry its messages as one string or as an array.
fn constraints_from(message: Option<&str>, body: &Value) -> Vec<String> {
    match body.get("message") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => message.map(|m| vec![m.to_string()]).unwrap_or_default(),
    }
}

fn pick_message(message: Option<&str>, body: &Value) -> String {
    message
        .filter(|m| !m.is_empty())
        .or_else(|| body.get("message").and_then(Value::as_str).filter(|m| !m.is_empty()))
        .unwrap_or(UNEXPECTED_ERROR_MESSAGE)
        .to_string()
}

fn strip_internal(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(mut map) => {
            for field in INTERNAL_FIELDS {
                map.remove(field);
            }
            map
        }
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_moves_messages_to_constraints() {
        let exception = AppException::validation(["name is required", "age must be positive"]);
        let info = normalize(&exception);

        assert_eq!(info.error_code, StatusCode::BAD_REQUEST);
        assert_eq!(info.message, VALIDATION_FAILED_MESSAGE);
        assert_eq!(
            Value::Object(info.details),
            json!({"constraints": ["name is required", "age must be positive"]})
        );
    }

    #[test]
    fn test_bad_request_body_message_array_is_validation() {
        let exception = AppException::http(StatusCode::BAD_REQUEST, "Bad Request").with_details(
            Payload::from(json!({"statusCode": 400, "message": ["a", "b"], "error": "Bad Request"})),
        );
        let info = normalize(&exception);

        assert_eq!(info.message, VALIDATION_FAILED_MESSAGE);
        assert_eq!(Value::Object(info.details), json!({"constraints": ["a", "b"]}));
    }

    #[test]
    fn test_bad_request_single_message_normalized_to_array() {
        let info = normalize(&AppException::http(StatusCode::BAD_REQUEST, "email is invalid"));
        assert_eq!(Value::Object(info.details), json!({"constraints": ["email is invalid"]}));
    }

    #[test]
    fn test_internal_fields_stripped_from_details() {
        let exception = AppException::http(StatusCode::NOT_FOUND, "user not found").with_details(
            Payload::from(json!({"statusCode": 404, "message": "x", "error": "Not Found", "id": 7})),
        );
        let info = normalize(&exception);

        assert_eq!(info.error_code, StatusCode::NOT_FOUND);
        assert_eq!(info.message, "user not found");
        assert_eq!(Value::Object(info.details), json!({"id": 7}));
    }

    #[test]
    fn test_missing_message_falls_back() {
        let exception = AppException::Internal {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some(String::new()),
            details: Payload::Undefined,
            source: None,
        };
        assert_eq!(normalize(&exception).message, UNEXPECTED_ERROR_MESSAGE);
    }

    #[test]
    fn test_plain_error_maps_to_500() {
        let info = normalize(&AppException::from_error(std::io::Error::other("db down")));
        assert_eq!(info.error_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(info.message, "db down");
        assert!(info.details.is_empty());
    }

    #[test]
    fn test_upstream_bad_request_is_not_validation() {
        let upstream = UpstreamResponse {
            status: Some(400),
            data: Payload::from(json!({"reason": "bad sku"})),
        };
        let exception = AppException::upstream(StatusCode::BAD_REQUEST, upstream, false)
            .with_message("catalog rejected request");
        let info = normalize(&exception);

        assert_eq!(info.message, "catalog rejected request");
        assert_eq!(
            info.details.get("upstreamResponse"),
            Some(&json!({"status": 400, "data": {"reason": "bad sku"}}))
        );
        assert!(!info.is_proxy_response());
    }

    #[test]
    fn test_details_are_decycled() {
        let details = Payload::object().with("id", 1);
        details.insert("again", details.clone());
        let exception = AppException::http(StatusCode::CONFLICT, "dup").with_details(details);

        let info = normalize(&exception);
        assert_eq!(
            Value::Object(info.details),
            json!({"id": 1, "again": {"$ref": "$"}})
        );
    }

    #[test]
    fn test_public_body_spreads_details() {
        let exception = AppException::http(StatusCode::CONFLICT, "already exists")
            .with_details(Payload::from(json!({"field": "email"})));
        let body = to_public_body(&normalize(&exception), false);
        assert_eq!(body, json!({"code": 409, "message": "already exists", "field": "email"}));
    }

    #[test]
    fn test_production_internal_error_withholds_details() {
        let exception = AppException::from_error(std::io::Error::other("password=secret in dsn"))
            .with_details(Payload::from(json!({"query": "select 1"})));
        let body = to_public_body(&normalize(&exception), true);
        assert_eq!(body, json!({"code": 500, "message": "unexpected error"}));
    }

    #[test]
    fn test_proxy_response_is_relayed_verbatim() {
        let upstream = UpstreamResponse {
            status: Some(422),
            data: Payload::from(json!({"foo": 1})),
        };
        let exception = AppException::upstream(StatusCode::UNPROCESSABLE_ENTITY, upstream, true);
        let info = normalize(&exception);

        assert_eq!(to_public_body(&info, false), json!({"foo": 1}));
        assert_eq!(to_public_body(&info, true), json!({"foo": 1}));
    }

    #[test]
    fn test_response_body_matches_details() {
        let exception = AppException::validation(["x"]);
        assert_eq!(exception.response_body().to_json(), json!({"constraints": ["x"]}));
    }
}

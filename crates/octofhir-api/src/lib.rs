use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

const FHIR_JSON: &str = "application/fhir+json";

/// Minimal FHIR OperationOutcome representation for API responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str, // always "OperationOutcome"
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationOutcomeIssue {
    /// FHIR issue severity: fatal | error | warning | information
    pub severity: &'static str,
    /// FHIR issue type code (subset used): invalid | structure | code-invalid | not-found | deleted | conflict | multiple-matches | exception
    pub code: &'static str,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// Element paths the issue refers to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

impl OperationOutcomeIssue {
    pub fn new(severity: &'static str, code: &'static str, diagnostics: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            diagnostics: Some(diagnostics.into()),
            expression: Vec::new(),
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.is_empty() {
            self.expression.push(path);
        }
        self
    }
}

impl OperationOutcome {
    pub fn new(issue: Vec<OperationOutcomeIssue>) -> Self {
        Self {
            resource_type: "OperationOutcome",
            issue,
        }
    }

    pub fn single(
        severity: &'static str,
        code: &'static str,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self::new(vec![OperationOutcomeIssue::new(severity, code, diagnostics)])
    }

    /// Create an OperationOutcome with multiple warning issues.
    pub fn warnings(messages: impl IntoIterator<Item = String>) -> Self {
        Self::new(
            messages
                .into_iter()
                .map(|msg| OperationOutcomeIssue::new("warning", "informational", msg))
                .collect(),
        )
    }

    /// Appends warning issues after the existing ones.
    pub fn with_warnings(mut self, messages: impl IntoIterator<Item = String>) -> Self {
        self.issue.extend(Self::warnings(messages).issue);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.issue
            .iter()
            .any(|i| matches!(i.severity, "error" | "fatal"))
    }
}

/// High-level API errors to be mapped to HTTP responses and FHIR OperationOutcome
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Gone: {message}")]
    Gone {
        message: String,
        /// Last known state, returned as the body when present.
        resource: Option<serde_json::Value>,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Precondition required: {0}")]
    PreconditionRequired(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity {
        message: String,
        operation_outcome: Option<OperationOutcome>,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn gone(msg: impl Into<String>) -> Self {
        Self::Gone {
            message: msg.into(),
            resource: None,
        }
    }
    pub fn gone_with_resource(msg: impl Into<String>, resource: serde_json::Value) -> Self {
        Self::Gone {
            message: msg.into(),
            resource: Some(resource),
        }
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }
    pub fn precondition_required(msg: impl Into<String>) -> Self {
        Self::PreconditionRequired(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
    pub fn unprocessable_entity(
        msg: impl Into<String>,
        outcome: Option<OperationOutcome>,
    ) -> Self {
        Self::UnprocessableEntity {
            message: msg.into(),
            operation_outcome: outcome,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone { .. } => StatusCode::GONE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::PreconditionRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        match self {
            ApiError::BadRequest(msg) => OperationOutcome::single("error", "invalid", msg),
            ApiError::NotFound(msg) => OperationOutcome::single("error", "not-found", msg),
            ApiError::Gone { message, .. } => OperationOutcome::single("error", "deleted", message),
            ApiError::Conflict(msg) => OperationOutcome::single("error", "conflict", msg),
            ApiError::PreconditionFailed(msg) => {
                OperationOutcome::single("error", "multiple-matches", msg)
            }
            ApiError::PreconditionRequired(msg) => {
                OperationOutcome::single("error", "required", msg)
            }
            ApiError::Internal(msg) => OperationOutcome::single("fatal", "exception", msg),
            ApiError::UnprocessableEntity {
                operation_outcome: Some(outcome),
                ..
            } => outcome.clone(),
            ApiError::UnprocessableEntity { message, .. } => {
                OperationOutcome::single("error", "invalid", message)
            }
        }
    }
}

fn fhir_json_response(
    status: StatusCode,
    body: Vec<u8>,
    headers: Vec<(HeaderName, HeaderValue)>,
) -> Response {
    let mut builder = axum::http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
    for (n, v) in headers {
        builder = builder.header(n, v);
    }
    builder
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| {
            let mut fallback = Response::new(axum::body::Body::from("{}"));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

fn serialize_or_fallback<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|_| {
        let fallback = OperationOutcome::single("fatal", "exception", "Serialization failure");
        serde_json::to_vec(&fallback).unwrap_or_else(|_| b"{}".to_vec())
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Gone {
                resource: Some(resource),
                ..
            } => serialize_or_fallback(resource),
            _ => serialize_or_fallback(&self.to_operation_outcome()),
        };
        fhir_json_response(status, body, Vec::new())
    }
}


// -------------------------
// API Response Wrapper
// -------------------------

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_etag_weak(mut self, version: impl Into<String>) -> Self {
        let tag = format!("W/\"{}\"", version.into());
        if let Ok(val) = HeaderValue::from_str(&tag) {
            self.headers.push((header::ETAG, val));
        }
        self
    }

    /// Provide a raw Last-Modified header value
    pub fn with_last_modified_raw(mut self, last_modified: impl Into<String>) -> Self {
        if let Ok(val) = HeaderValue::from_str(&last_modified.into()) {
            self.headers.push((header::LAST_MODIFIED, val));
        }
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serialize_or_fallback(&self.value);
        fhir_json_response(self.status, body, self.headers)
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_response_created_sets_status_and_content_type() {
        let payload = json!({"resourceType": "Patient"});
        let resp = ApiResponse::created(payload).into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static(FHIR_JSON));
    }

    #[test]
    fn etag_and_last_modified_headers_added() {
        let payload = json!({"resourceType":"Patient","id":"1"});
        let resp = ApiResponse::ok(payload)
            .with_etag_weak("7")
            .with_last_modified_raw("Wed, 21 Oct 2015 07:28:00 GMT")
            .into_response();
        assert_eq!(
            resp.headers().get(header::ETAG).unwrap(),
            &HeaderValue::from_static("W/\"7\"")
        );
        assert_eq!(
            resp.headers().get(header::LAST_MODIFIED).unwrap(),
            &HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }
}

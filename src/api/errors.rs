use std::fmt::Display;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::{Error, ErrorCategory, StoreError};

/// Error details carried on an error response until [`describe_request`]
/// adds the request they belong to.
#[derive(Debug, Clone)]
pub struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ErrorBody {
    fn to_json(&self) -> Value {
        json!({
            "error": self.code,
            "message": self.message,
        })
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match (err.category(), err) {
        (ErrorCategory::BadRequest, _) => StatusCode::BAD_REQUEST,
        (ErrorCategory::NotFound, _) => StatusCode::NOT_FOUND,
        (_, Error::Unavailable(StoreError::Timeout | StoreError::Poisoned)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        (ErrorCategory::Unavailable, _) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_to_response(err: Error) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(%err, "request failed");
    } else {
        warn!(%err, "request rejected");
    }
    json_error(status, err.code(), err.to_string())
}

/// Body, path and query extraction failures are all the caller's fault.
pub fn rejection_to_response(rejection: impl Display) -> Response {
    warn!(%rejection, "malformed request");
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.to_string())
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        code,
        message: message.into(),
    };
    let mut response = (status, axum::Json(body.to_json())).into_response();
    response.extensions_mut().insert(body);
    response
}

/// Adds the request path and method to every error body.
pub async fn describe_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;

    let Some(body) = response.extensions().get::<ErrorBody>().cloned() else {
        return response;
    };
    let mut described = body.to_json();
    described["request"] = Value::from(path);
    described["method"] = Value::from(method.as_str());
    (response.status(), axum::Json(described)).into_response()
}
